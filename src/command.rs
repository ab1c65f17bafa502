use futures::{
    FutureExt, Stream, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// An action emitted by a command and handled by the runtime.
pub enum Action<Msg> {
    /// Deliver a message to the application's `update` function.
    Message(Msg),

    /// Stop the runtime. Running subscriptions are cancelled.
    Quit,
}

/// A one-off asynchronous side effect that produces messages.
///
/// Mutations ([`MutationResource::command`](crate::MutationResource::command)),
/// refetches ([`QueryResource::refetch_command`](crate::QueryResource::refetch_command))
/// and cache invalidations ([`QueryClient::invalidate_command`](crate::QueryClient::invalidate_command))
/// are all exposed as commands so an application can trigger them from `update`.
///
/// # Examples
///
/// ```
/// use tears_query::command::Command;
///
/// enum Message {
///     RevenueLoaded(u64),
/// }
///
/// let cmd = Command::perform(async { 12_500 }, Message::RevenueLoaded);
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// A command with no side effect.
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Runs `future` and converts its output into a message with `f`.
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Runs a future whose output is already a message.
    ///
    /// ```
    /// use tears_query::command::Command;
    ///
    /// let cmd = Command::future(async { "bay 3 reserved" });
    /// ```
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Emits a single action immediately.
    ///
    /// ```
    /// use tears_query::command::{Action, Command};
    ///
    /// let quit: Command<()> = Command::effect(Action::Quit);
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Runs several commands concurrently.
    ///
    /// Message order across commands is not guaranteed. `Command::none()`
    /// entries are dropped; a batch of nothing is `Command::none()`.
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Delivers every item of `stream` as a message.
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.map(Action::Message).boxed()),
        }
    }

    /// Converts every message produced by this command.
    ///
    /// `Action::Quit` passes through unchanged.
    ///
    /// ```
    /// use tears_query::command::Command;
    ///
    /// enum Message {
    ///     MembersCounted(usize),
    /// }
    ///
    /// let cmd = Command::future(async { 48_usize }).map(Message::MembersCounted);
    /// ```
    pub fn map<NewMsg>(self, f: impl Fn(Msg) -> NewMsg + Send + 'static) -> Command<NewMsg>
    where
        NewMsg: Send + 'static,
    {
        Command {
            stream: self.stream.map(|stream| {
                stream
                    .map(move |action| match action {
                        Action::Message(msg) => Action::Message(f(msg)),
                        Action::Quit => Action::Quit,
                    })
                    .boxed()
            }),
        }
    }

    /// Returns `true` if this command does nothing.
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }
}
