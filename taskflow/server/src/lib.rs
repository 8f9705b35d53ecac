pub mod config {
    use config::builder::DefaultState;
    use config::ConfigBuilder;
    use sea_orm::ConnectOptions;
    use serde::Deserialize;
    use std::time::Duration;

    /// Deployment profile. Selects the CORS policy.
    #[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Profile {
        #[default]
        Dev,
        Prod,
    }

    #[derive(Deserialize, Debug)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        #[serde(default)]
        pub profile: Profile,
        /// Origins accepted in the `prod` profile.
        #[serde(default)]
        pub cors_allowed_origins: Vec<String>,
        #[serde(default = "default_db_max_connections")]
        pub db_max_connections: u32,
        #[serde(default = "default_db_min_connections")]
        pub db_min_connections: u32,
        #[serde(default = "default_db_connect_timeout_secs")]
        pub db_connect_timeout_secs: u64,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let builder = config::Config::builder().add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins"),
            );
            Self::from_builder(builder)
        }

        /// Builds configuration from an already populated builder.
        pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
            let settings = builder.build()?;
            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }

        /// Connection pool settings for the task database.
        pub fn connect_options(&self) -> ConnectOptions {
            let mut options = ConnectOptions::new(self.db_url.clone());
            options
                .max_connections(self.db_max_connections)
                .min_connections(self.db_min_connections)
                .connect_timeout(Duration::from_secs(self.db_connect_timeout_secs));
            options
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_db_max_connections() -> u32 {
        3
    }

    fn default_db_min_connections() -> u32 {
        1
    }

    fn default_db_connect_timeout_secs() -> u64 {
        30
    }

}
pub mod clock;
pub mod entities;
pub mod task;
pub mod web;
