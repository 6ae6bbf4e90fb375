//! console collaborator: asking the user to pick one option
use std::io::IsTerminal;
use std::sync::Mutex;

pub trait Console: Send + Sync {
    /// A non interactive console is never asked, callers pick the default themselves
    fn is_interactive(&self) -> bool;

    /// Index of the chosen option
    fn choose_one(&self, prompt: &str, options: &[String], default: usize) -> Result<usize, ConsoleError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ConsoleError {
    #[error("failed to read the choice")]
    Dialog(#[from] dialoguer::Error),
    #[error("nothing to choose from")]
    NoOptions,
    #[error("choice {0} is not one of the options")]
    InvalidChoice(usize),
}

/// Never interactive, always picks the default
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchConsole;

impl Console for BatchConsole {
    fn is_interactive(&self) -> bool {
        false
    }

    fn choose_one(&self, prompt: &str, options: &[String], default: usize) -> Result<usize, ConsoleError> {
        if options.is_empty() {
            return Err(ConsoleError::NoOptions);
        }
        tracing::debug!(prompt, choice = ?options.get(default), "batch console picks the default");
        Ok(default.min(options.len() - 1))
    }
}

/// Interactive selection on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn choose_one(&self, prompt: &str, options: &[String], default: usize) -> Result<usize, ConsoleError> {
        if options.is_empty() {
            return Err(ConsoleError::NoOptions);
        }
        let choice = dialoguer::Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(default.min(options.len() - 1))
            .interact()?;
        Ok(choice)
    }
}

/// Answers from a fixed list, for tests and scripted runs
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: Mutex<Vec<usize>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConsole {
    pub fn new(answers: impl IntoIterator<Item = usize>) -> Self {
        let mut answers: Vec<usize> = answers.into_iter().collect();
        answers.reverse();
        Self {
            answers: Mutex::new(answers),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompts asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Console for ScriptedConsole {
    fn is_interactive(&self) -> bool {
        true
    }

    fn choose_one(&self, prompt: &str, options: &[String], default: usize) -> Result<usize, ConsoleError> {
        if options.is_empty() {
            return Err(ConsoleError::NoOptions);
        }
        self.asked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{prompt} {options:?}"));

        let answer = self
            .answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or(default);
        if answer >= options.len() {
            return Err(ConsoleError::InvalidChoice(answer));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn batch_picks_the_default() {
        assert_eq!(BatchConsole.choose_one("?", &options(), 1).unwrap(), 1);
        assert!(matches!(
            BatchConsole.choose_one("?", &[], 0),
            Err(ConsoleError::NoOptions)
        ));
    }

    #[test]
    fn scripted_answers_in_order_then_default() {
        let console = ScriptedConsole::new([1, 0]);
        assert_eq!(console.choose_one("first", &options(), 0).unwrap(), 1);
        assert_eq!(console.choose_one("second", &options(), 1).unwrap(), 0);
        assert_eq!(console.choose_one("third", &options(), 1).unwrap(), 1);
        assert_eq!(console.asked().len(), 3);

        let invalid = ScriptedConsole::new([5]);
        assert!(matches!(
            invalid.choose_one("?", &options(), 0),
            Err(ConsoleError::InvalidChoice(5))
        ));
    }
}
