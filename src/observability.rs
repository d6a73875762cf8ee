use crate::config::ObservabilityCfg;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Filter applied when neither `RUST_LOG` nor `log_filter` is set.
const DEFAULT_DIRECTIVES: &str = "info,okex_swap_bot=debug";

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured `log_filter`; JSON output is a deploy-time toggle.
pub fn init_tracing(cfg: &ObservabilityCfg) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = cfg.log_filter.as_deref().unwrap_or(DEFAULT_DIRECTIVES);
            EnvFilter::try_new(directives)
                .with_context(|| format!("bad log filter '{directives}'"))?
        }
    };

    if cfg.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
