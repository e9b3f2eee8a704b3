//! Generation counters used to discard superseded responses.

/// Monotonic counter bumped whenever a newer request supersedes older ones.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Generation(u64);

/// Snapshot of a [`Generation`] taken before a request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

impl Generation {
    /// Supersedes every outstanding ticket and returns a fresh one.
    pub fn issue(&mut self) -> Ticket {
        self.0 += 1;
        Ticket(self.0)
    }

    /// Supersedes every outstanding ticket.
    pub fn advance(&mut self) {
        self.0 += 1;
    }

    /// Returns a ticket for the current generation without advancing it.
    pub fn current(&self) -> Ticket {
        Ticket(self.0)
    }

    /// Returns `true` if no newer request was started since `ticket` was issued.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0 == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let mut generation = Generation::default();
        let first = generation.issue();
        let second = generation.issue();

        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));

        generation.advance();
        assert!(!generation.is_current(second));
        assert!(generation.is_current(generation.current()));
    }
}
