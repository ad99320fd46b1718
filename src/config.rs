use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{scheduler::DEFAULT_REFRESH_LEAD, slots::SlotDuration};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub token_path: Option<PathBuf>,
    pub slot_duration: SlotDuration,
    pub refresh_lead: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_url = env::var("DCMS_API_URL")?;
        let token_path = env::var("DCMS_TOKEN_PATH").ok().map(PathBuf::from);
        let slot_duration = env::var("DCMS_SLOT_MINUTES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .and_then(|m| SlotDuration::try_from(m).ok())
            .unwrap_or_default();
        let refresh_lead = env::var("DCMS_REFRESH_LEAD_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REFRESH_LEAD);

        Ok(Self {
            api_url,
            token_path,
            slot_duration,
            refresh_lead,
        })
    }

    /// Config pointing at `api_url` with every other knob at its default.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token_path: None,
            slot_duration: SlotDuration::default(),
            refresh_lead: DEFAULT_REFRESH_LEAD,
        }
    }
}
