use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    pub PP_API_BASE: &str = "https://api.perplexity.ai";

    /// Takes precedence over the key stored in the config file.
    pub PP_API_KEY: Option<&str> = None;

    pub PP_DEFAULT_MODEL: &str = "sonar-pro";
    pub PP_RESEARCH_MODEL: &str = "sonar-reasoning";

    pub PP_REQUEST_TIMEOUT_MS: Duration = Duration::from_millis(300_000), |value| {
        value.parse().map(Duration::from_millis)
    };

    // Reasoning models can stay silent for a long time before the first
    // token, so the idle window is generous.
    pub PP_STREAM_IDLE_TIMEOUT_MS: Duration = Duration::from_millis(300_000), |value| {
        value.parse().map(Duration::from_millis)
    };

    /// Name of a theme bundled with syntect, e.g. "Solarized (dark)".
    pub PP_CODE_THEME: &str = "base16-ocean.dark";
}
