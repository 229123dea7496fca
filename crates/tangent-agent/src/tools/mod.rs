//! Built-in tools.
//!
//! Seventeen in-process tools in three categories: pure (no I/O), network,
//! and local. [`builtin_tools`] is the full set the catalog registers.

use std::sync::Arc;

use crate::tool::Tool;

pub mod local;
pub mod net;
pub mod pure;

pub use local::{FileSizesTool, LocalCurlTool, LsTool, PwdTool, WhoamiTool};
pub use net::{BraveSearchTool, DnsLookupTool, HttpHeadTool, WeatherTool, WebFetchTool};
pub use pure::{
    Base64Tool, CalculatorTool, CurrentTimeTool, HashTool, TextStatsTool, UrlCodecTool, UuidTool,
};

/// The full built-in tool set.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CalculatorTool),
        Arc::new(CurrentTimeTool),
        Arc::new(UuidTool),
        Arc::new(HashTool),
        Arc::new(Base64Tool),
        Arc::new(UrlCodecTool),
        Arc::new(TextStatsTool),
        Arc::new(DnsLookupTool),
        Arc::new(HttpHeadTool),
        Arc::new(WebFetchTool::new()),
        Arc::new(BraveSearchTool::from_env()),
        Arc::new(WeatherTool),
        Arc::new(WhoamiTool),
        Arc::new(PwdTool),
        Arc::new(LsTool),
        Arc::new(FileSizesTool),
        Arc::new(LocalCurlTool),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_count_and_unique_names() {
        let tools = builtin_tools();
        assert_eq!(tools.len(), 17);

        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 17);
    }
}
