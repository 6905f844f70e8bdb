//! Real-time clock sources

use serde::Deserialize;

use super::Component;
use crate::codegen::{CodeGen, Expr};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::validation::{IssueType, SchemaContext};
use crate::{ConfigError, ConfigResult};

const MAX_SERVERS: usize = 3;
const DEFAULT_SERVERS: [&str; MAX_SERVERS] = ["0.pool.ntp.org", "1.pool.ntp.org", "2.pool.ntp.org"];

/// `time: - platform: sntp`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SntpConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub servers: Vec<String>,

    /// POSIX TZ string
    #[serde(default)]
    pub timezone: Option<String>,
}

/// `time:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum TimeConfig {
    Sntp(SntpConfig),
}

impl TimeConfig {
    /// As a module
    pub fn as_component(&self) -> &dyn Component {
        self
    }

    /// As a mutable module
    pub fn as_component_mut(&mut self) -> &mut dyn Component {
        self
    }
}

impl Component for TimeConfig {
    fn domain(&self) -> &'static str {
        "time"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let Self::Sntp(sntp) = self;
        vec![IdField::Declare { id: &mut sntp.id, kind: IdKind::Time, prefix: "sntp_time", path: path.clone() }]
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        let Self::Sntp(sntp) = self;
        if sntp.servers.len() > MAX_SERVERS {
            ctx.error(
                IssueType::OutOfRange,
                path.key("servers"),
                format!("At most {MAX_SERVERS} NTP servers are supported"),
            );
        }
        if sntp.servers.is_empty() {
            sntp.servers = DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect();
        }
    }

    fn final_validate(&self, ctx: &mut super::FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        if ctx.config.wifi.is_none() {
            return Err(ConfigError::invalid(path.clone(), "Component time.sntp requires component wifi"));
        }
        Ok(())
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let Self::Sntp(sntp) = self;
        let id = super::required_id(&sntp.id, path)?;
        let servers: Vec<Expr> = sntp.servers.iter().map(|s| Expr::from(s.as_str())).collect();
        let var = cg.new_pvariable(id, "sntp::SNTPComponent", vec![Expr::List(servers)]);
        cg.register_component(&var);
        if let Some(timezone) = &sntp.timezone {
            cg.call(&var, "set_timezone", vec![timezone.as_str().into()]);
        }
        cg.add_define("USE_TIME");
        Ok(())
    }
}
