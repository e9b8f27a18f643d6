use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 函式庫與兩個執行檔的 tracing target
const CRATE_TARGETS: [&str; 3] = ["sports_llm", "sportsllm", "nba_tools"];

fn default_directives(verbose: bool, level: Option<&str>) -> String {
    let level = match (verbose, level) {
        (true, _) => "debug",
        (false, Some(level)) => level,
        (false, None) => "info",
    };

    let mut directives: Vec<String> = CRATE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect();
    // verbose 模式下其他 crate 仍維持 info
    if verbose {
        directives.push("info".to_string());
    }
    directives.join(",")
}

fn build_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, level)))
}

pub fn init_cli_logger(verbose: bool, level: Option<&str>) {
    tracing_subscriber::registry()
        .with(build_filter(verbose, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON 格式日誌，適合交由程序管理器收集
pub fn init_json_logger(verbose: bool, level: Option<&str>) {
    tracing_subscriber::registry()
        .with(build_filter(verbose, level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_binaries() {
        assert_eq!(
            default_directives(false, None),
            "sports_llm=info,sportsllm=info,nba_tools=info"
        );
        assert_eq!(
            default_directives(false, Some("warn")),
            "sports_llm=warn,sportsllm=warn,nba_tools=warn"
        );
        assert_eq!(
            default_directives(true, Some("warn")),
            "sports_llm=debug,sportsllm=debug,nba_tools=debug,info"
        );
    }

    #[test]
    fn test_default_directives_parse() {
        for verbose in [true, false] {
            assert!(EnvFilter::try_new(default_directives(verbose, Some("trace"))).is_ok());
        }
    }
}
