pub mod config {
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Deserialize, Debug, Clone, PartialEq)]
    pub struct Config {
        #[serde(default = "default_port")]
        pub port: u16,
        #[serde(default = "default_state_file")]
        pub state_file: PathBuf,
    }

    impl Default for Config {
        fn default() -> Self {
            Self {
                port: default_port(),
                state_file: default_state_file(),
            }
        }
    }

    impl Config {
        /// Loads configuration from environment variables (`PORT`, `STATE_FILE`).
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_environment(config::Environment::default())
        }

        fn from_environment(environment: config::Environment) -> anyhow::Result<Self> {
            let settings = config::Config::builder().add_source(environment).build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_state_file() -> PathBuf {
        PathBuf::from("kanban_state.json")
    }

}
pub mod board;
pub mod json;
pub mod persistence;
pub mod store;
pub mod web;
