//! Console input read on a dedicated thread.
//!
//! `tokio::io::stdin()` reads on the runtime's blocking pool, and a read
//! pending there holds up runtime shutdown until a line arrives. Lines are
//! read here on a plain thread and handed over through a channel, so an
//! interrupted prompt leaves nothing for the runtime to wait on.

use std::io::{BufRead, Cursor};

use futures_util::stream;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

const INPUT_THREAD_NAME: &str = "console-input";

/// One line, or the error that ended reading.
type Chunk = std::io::Result<Cursor<Vec<u8>>>;

/// Read `source` line by line on its own thread and expose the lines as an
/// async buffered reader.
///
/// The thread ends at end of input, on a read error (which is passed on to
/// the async side) or once the returned reader is dropped and the next line
/// cannot be delivered.
///
/// # Errors
///
/// Returns the I/O error if the thread cannot be spawned.
pub fn threaded_lines<S>(mut source: S) -> std::io::Result<impl AsyncBufRead + Unpin + Send>
where
    S: BufRead + Send + 'static,
{
    let (sender, mut receiver) = mpsc::channel::<Chunk>(1);
    std::thread::Builder::new()
        .name(String::from(INPUT_THREAD_NAME))
        .spawn(move || pump_lines(&mut source, &sender))?;

    let lines = stream::poll_fn(move |cx| receiver.poll_recv(cx));
    Ok(StreamReader::new(lines))
}

fn pump_lines<S: BufRead>(source: &mut S, sender: &mpsc::Sender<Chunk>) {
    loop {
        let mut line = Vec::new();
        let item = match source.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Ok(_) => Ok(Cursor::new(line)),
            Err(error) => Err(error),
        };
        let failed = item.is_err();
        if sender.blocking_send(item).is_err() || failed {
            return;
        }
    }
}
