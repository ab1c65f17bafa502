use crate::{command::Command, subscription::Subscription};

/// A headless application in the Elm style: a model, messages, an update
/// function and a declared set of subscriptions.
///
/// Pages of a dashboard typically hold their [`QueryResource`](crate::QueryResource)s
/// and [`MutationResource`](crate::MutationResource)s in the model, subscribe to
/// their state with `watch()`, and trigger mutations and refetches as commands.
///
/// # Example
///
/// ```
/// use tears_query::prelude::*;
///
/// struct StaffPage {
///     staff: QueryResource<Vec<String>>,
///     current: ResourceState<Vec<String>>,
/// }
///
/// enum Message {
///     Staff(ResourceState<Vec<String>>),
///     Refresh,
/// }
///
/// impl Application for StaffPage {
///     type Message = Message;
///     type Flags = ();
///
///     fn new(_flags: ()) -> (Self, Command<Message>) {
///         let staff = QueryResource::new(
///             &"staff",
///             || Box::pin(async { Ok::<_, ResourceError>(vec!["Ana".to_string()]) }),
///             QueryOptions::default(),
///         );
///         let current = staff.state();
///         (Self { staff, current }, Command::none())
///     }
///
///     fn update(&mut self, msg: Message) -> Command<Message> {
///         match msg {
///             Message::Staff(state) => {
///                 self.current = state;
///                 Command::none()
///             }
///             Message::Refresh => self.staff.refetch_command(),
///         }
///     }
///
///     fn subscriptions(&self) -> Vec<Subscription<Message>> {
///         vec![Subscription::new(self.staff.watch()).map(Message::Staff)]
///     }
/// }
/// ```
pub trait Application: Sized {
    /// The messages this application processes.
    type Message: Send + 'static;

    /// Data passed to [`Application::new`]. Use `()` if none is needed.
    type Flags: Send;

    /// Builds the initial model and an optional startup command.
    ///
    /// Called from within the Tokio runtime, so resources may be created here.
    fn new(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Applies a message to the model and returns the follow-up command.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Declares the subscriptions that should be running for the current model.
    ///
    /// Called after initialization and after every update; the runtime only
    /// starts and stops the subscriptions whose ids changed.
    fn subscriptions(&self) -> Vec<Subscription<Self::Message>>;
}
