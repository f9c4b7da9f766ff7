// menu.rs

use std::str::FromStr;
use tokio::io::AsyncBufRead;
use tracing::{debug, warn};

use crate::{
    client::{keyboard_line, ChatClient},
    console::Console,
    error::{CommandError, ConnectError},
    target::ConnectionTarget,
};

const MENU_TEXT: &str = "\
Welcome to the chatroom!
To connect to the chatroom, type: /connect <ip of chat server>:<port>
To disconnect from the chatroom, type: /quit
Upon joining, type: /nick <nickname>
To send a message, type: /msg <message>
To see a list of commands, type: /help";

#[derive(Debug, PartialEq, Eq)]
pub enum MenuCommand {
    Connect(ConnectionTarget),
    Quit,
    Help,
}

impl FromStr for MenuCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line {
            "/quit" => return Ok(MenuCommand::Quit),
            "/help" => return Ok(MenuCommand::Help),
            _ => {}
        }

        if !line.starts_with("/connect") {
            return Err(CommandError::Malformed);
        }
        match line.split_whitespace().collect::<Vec<_>>()[..] {
            ["/connect", address] => address.parse().map(MenuCommand::Connect).map_err(|e| {
                debug!(address, error = %e, "bad address");
                CommandError::Malformed
            }),
            _ => Err(CommandError::Malformed),
        }
    }
}

/// Pre-connection prompt. Hands its input over to exactly one `ChatClient`
/// and is done once that client returns.
pub struct Menu<I> {
    input: I,
    console: Console,
}

impl<I: AsyncBufRead + Unpin> Menu<I> {
    pub fn new(input: I, console: Console) -> Self {
        Menu { input, console }
    }

    /// Runs until the user quits or the one client session ends. A failed dial
    /// comes back as the error after its message has been printed.
    pub async fn run(self) -> Result<(), ConnectError> {
        let Menu { mut input, console } = self;
        console.println(MENU_TEXT);

        loop {
            console.prompt();

            let parsed = match keyboard_line(&mut input).await {
                Ok(Some(line)) => line.and_then(|line| line.parse::<MenuCommand>()),
                Ok(None) => {
                    console.println("Goodbye!");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    console.println("Goodbye!");
                    return Ok(());
                }
            };

            match parsed {
                Ok(MenuCommand::Quit) => {
                    console.println("Goodbye!");
                    return Ok(());
                }
                Ok(MenuCommand::Help) => console.println(MENU_TEXT),
                Ok(MenuCommand::Connect(target)) => {
                    let mut client = ChatClient::new(target, input, console);
                    return client.start().await;
                }
                Err(e) => console.println(&e.to_string()),
            }
        }
    }
}
