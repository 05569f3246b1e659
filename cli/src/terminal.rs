use std::sync::Arc;

use color_eyre::eyre::{self, eyre};
use movie_search_core::Frame;
use movie_search_lazy_data::CacheStats;
use parking_lot::Mutex;
use tmdb_api::movies::MovieSummary;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::debug;

use crate::movies::Message;

/// What the input side needs to know about the last committed frame.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Results listed on screen, in display order.
    pub listed: Vec<MovieSummary>,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the query, one keystroke at a time.
    Type(String),
    /// Open the n-th listed result, counting from 1.
    Open(usize),
    Back,
    Stats,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> eyre::Result<Self> {
        let Some(command) = line.strip_prefix(':') else {
            return Ok(Command::Type(line.to_string()));
        };

        let mut words = command.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("open"), Some(n)) => match n.parse() {
                Ok(n) if n > 0 => Command::Open(n),
                _ => return Err(eyre!("not a result number: {n}")),
            },
            (Some("back"), None) => Command::Back,
            (Some("stats"), None) => Command::Stats,
            (Some("quit" | "q"), None) => Command::Quit,
            _ => return Err(eyre!("unknown command: {line}")),
        };
        Ok(command)
    }

    /// The messages this command sends, if any.
    pub fn messages(&self, listed: &[MovieSummary]) -> eyre::Result<Vec<Message>> {
        let messages = match self {
            Command::Type(text) => std::iter::once(Message::Clear)
                .chain(text.chars().map(Message::Input))
                .collect(),
            Command::Open(n) => {
                let result = n
                    .checked_sub(1)
                    .and_then(|index| listed.get(index))
                    .ok_or_else(|| eyre!("no result {n} on screen"))?;
                vec![Message::Open(result.clone())]
            }
            Command::Back => vec![Message::Back],
            Command::Stats | Command::Quit => Vec::new(),
        };
        Ok(messages)
    }
}

/// Reads commands from stdin until EOF or `:quit`.
///
/// Dropping `tx` on return is what stops the render loop.
pub async fn read_commands(
    tx: mpsc::UnboundedSender<Message>,
    snapshot: Arc<Mutex<Snapshot>>,
) -> eyre::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(line.trim_end()) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        debug!(?command, "Read command");

        match command {
            Command::Quit => break,
            Command::Stats => println!("{}", snapshot.lock().stats),
            command => {
                let messages = match command.messages(&snapshot.lock().listed) {
                    Ok(messages) => messages,
                    Err(err) => {
                        eprintln!("{err}");
                        continue;
                    }
                };
                for message in messages {
                    if tx.send(message).is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

pub fn present(frame: &Frame) {
    println!("---- frame {} ----", frame.sequence);
    print!("{}", frame.element);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> MovieSummary {
        MovieSummary {
            id,
            title: format!("Movie {id}"),
            poster_path: None,
            overview: String::new(),
            release_date: None,
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("alien").unwrap(), Command::Type("alien".into()));
        assert_eq!(Command::parse("").unwrap(), Command::Type(String::new()));
        assert_eq!(Command::parse(":open 2").unwrap(), Command::Open(2));
        assert_eq!(Command::parse(":back").unwrap(), Command::Back);
        assert_eq!(Command::parse(":stats").unwrap(), Command::Stats);
        assert_eq!(Command::parse(":q").unwrap(), Command::Quit);

        assert!(Command::parse(":open 0").is_err());
        assert!(Command::parse(":open two").is_err());
        assert!(Command::parse(":back now").is_err());
        assert!(Command::parse(":rewind").is_err());
    }

    #[test]
    fn typing_replaces_the_query_keystroke_by_keystroke() {
        let messages = Command::Type("ab".into()).messages(&[]).unwrap();
        assert!(matches!(
            messages.as_slice(),
            [Message::Clear, Message::Input('a'), Message::Input('b')]
        ));
    }

    #[test]
    fn open_picks_from_the_listed_results() {
        let listed = [summary(10), summary(20)];
        let messages = Command::Open(2).messages(&listed).unwrap();
        assert!(matches!(messages.as_slice(), [Message::Open(m)] if m.id == 20));
        assert!(Command::Open(3).messages(&listed).is_err());
    }
}
