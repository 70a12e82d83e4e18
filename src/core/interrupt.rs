use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;

/// Operator command, time-ordered through the signal queue. Consumed at most
/// once, by whichever invocation's poll loop sees it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSignal {
    Skip,
    Quit,
}

/// Consumer half of the signal queue. Single consumer, orchestrator-only;
/// `poll` never blocks.
pub struct SignalQueue {
    rx: mpsc::UnboundedReceiver<InterruptSignal>,
}

impl SignalQueue {
    pub fn poll(&mut self) -> Option<InterruptSignal> {
        self.rx.try_recv().ok()
    }
}

/// Build a detached queue pair. The listener uses this; tests inject signals
/// through the sender directly.
pub fn signal_channel() -> (mpsc::UnboundedSender<InterruptSignal>, SignalQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, SignalQueue { rx })
}

/// Long-lived stdin reader classifying operator input. Started once per run;
/// lives on its own OS thread so a blocked read never touches the
/// orchestrator. Dropping the queue ends the thread at its next send.
pub struct InterruptListener {
    _handle: thread::JoinHandle<()>,
}

impl InterruptListener {
    pub fn spawn() -> (Self, SignalQueue) {
        let (tx, queue) = signal_channel();

        let handle = thread::Builder::new()
            .name("interrupt-listener".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    let Some(signal) = classify(&line) else {
                        continue;
                    };
                    tracing::debug!("operator signal: {:?}", signal);
                    if tx.send(signal).is_err() {
                        // Queue dropped at shutdown; unsent signals are discarded.
                        break;
                    }
                }
            })
            .expect("failed to spawn interrupt listener thread");

        (Self { _handle: handle }, queue)
    }
}

fn classify(input: &str) -> Option<InterruptSignal> {
    match input.trim().to_ascii_lowercase().as_str() {
        "s" | "skip" => Some(InterruptSignal::Skip),
        "q" | "quit" | "exit" => Some(InterruptSignal::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_aliases_and_noise() {
        assert_eq!(classify("s"), Some(InterruptSignal::Skip));
        assert_eq!(classify("  SKIP "), Some(InterruptSignal::Skip));
        assert_eq!(classify("q"), Some(InterruptSignal::Quit));
        assert_eq!(classify("exit"), Some(InterruptSignal::Quit));
        assert_eq!(classify(""), None);
        assert_eq!(classify("help"), None);
    }

    #[test]
    fn queue_is_fifo_and_nonblocking() {
        let (tx, mut queue) = signal_channel();
        assert_eq!(queue.poll(), None);

        tx.send(InterruptSignal::Skip).unwrap();
        tx.send(InterruptSignal::Quit).unwrap();

        assert_eq!(queue.poll(), Some(InterruptSignal::Skip));
        assert_eq!(queue.poll(), Some(InterruptSignal::Quit));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn signals_sent_while_idle_stay_queued() {
        let (tx, mut queue) = signal_channel();
        tx.send(InterruptSignal::Quit).unwrap();
        // Nothing consumed them yet; the next poll (the next scan's loop)
        // still observes the signal.
        assert_eq!(queue.poll(), Some(InterruptSignal::Quit));
    }
}
