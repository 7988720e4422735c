//! Quote report rendering: tera HTML template, converted to PDF with
//! `wkhtmltopdf` when it is installed.

pub mod filters;
pub mod renderer;

pub use renderer::{QuoteReportRenderer, ReportError, QUOTE_TEMPLATE};
