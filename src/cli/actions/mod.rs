pub mod server;

// Internal "interpreter" for `Action`, kept apart so this file stays small.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Whether the loaded configuration asks for debug logging.
    #[must_use]
    pub fn debug(&self) -> bool {
        match self {
            Self::Server(args) => args.config.debug,
        }
    }

    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
