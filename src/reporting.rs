//! # Reporting Module / 报告模块
//!
//! Report renderers for finished audits: a styled HTML file and a colourful
//! console summary, both localised.
//!
//! 已完成审计的报告渲染器：样式化的 HTML 文件和彩色控制台摘要，均支持国际化。

pub mod console;
pub mod html;

// Re-export common reporting functions
pub use console::{print_plan, print_summary};
pub use html::HtmlRenderer;
