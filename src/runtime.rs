use color_eyre::eyre::{Result, eyre};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{
    application::Application,
    command::{Action, Command},
    subscription::{Subscription, SubscriptionManager},
};

/// Drives an [`Application`]: delivers messages to `update`, executes the
/// returned commands and keeps subscriptions in sync with the model.
pub struct Runtime<A: Application> {
    app: A,
    init: Option<Command<A::Message>>,
    tx: mpsc::UnboundedSender<Action<A::Message>>,
    rx: mpsc::UnboundedReceiver<Action<A::Message>>,
    subscription_manager: SubscriptionManager<Action<A::Message>>,
}

impl<A: Application> Runtime<A> {
    /// Initializes the application. Must be called from within a Tokio runtime.
    pub fn new(flags: A::Flags) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (app, init) = A::new(flags);
        let subscription_manager = SubscriptionManager::new(tx.clone());

        Self {
            app,
            init: Some(init),
            tx,
            rx,
            subscription_manager,
        }
    }

    /// Runs until a command emits [`Action::Quit`], then returns the final model.
    ///
    /// # Errors
    ///
    /// Returns an error if the message channel closes unexpectedly.
    pub async fn run(mut self) -> Result<A> {
        if let Some(init) = self.init.take() {
            self.execute(init);
        }
        self.refresh_subscriptions();

        loop {
            let Some(action) = self.rx.recv().await else {
                return Err(eyre!("runtime message channel closed"));
            };

            match action {
                Action::Message(msg) => {
                    let cmd = self.app.update(msg);
                    self.execute(cmd);
                    self.refresh_subscriptions();
                }
                Action::Quit => {
                    debug!("quit requested");
                    break;
                }
            }
        }

        self.subscription_manager.shutdown().await;
        Ok(self.app)
    }

    fn execute(&self, cmd: Command<A::Message>) {
        let Some(mut stream) = cmd.stream else {
            return;
        };

        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(action) = stream.next().await {
                if tx.send(action).is_err() {
                    trace!("runtime stopped, dropping command output");
                    break;
                }
            }
        });
    }

    fn refresh_subscriptions(&mut self) {
        let subscriptions = self
            .app
            .subscriptions()
            .into_iter()
            .map(|subscription: Subscription<A::Message>| subscription.map(Action::Message));
        self.subscription_manager.update(subscriptions);
    }
}
