use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::{PaperSize, Quality};

/// The three steps of the option negotiation dialog.
///
/// A session starts at CONFIRM_PRINT and ends when the job is submitted or
/// cancelled: CONFIRM_PRINT ⇄ SET_OPTIONS ⇄ SET_COPIES
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ConfirmPrint,
    SetOptions,
    SetCopies,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ConfirmPrint => write!(f, "CONFIRM_PRINT"),
            Step::SetOptions => write!(f, "SET_OPTIONS"),
            Step::SetCopies => write!(f, "SET_COPIES"),
        }
    }
}

/// What the user may answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmInput {
    Yes,
    Cancel,
    Options,
}

impl FromStr for ConfirmInput {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "YA" | "Y" | "YES" | "OK" => Ok(ConfirmInput::Yes),
            "BATAL" | "CANCEL" | "NO" | "TIDAK" => Ok(ConfirmInput::Cancel),
            "OPSI" | "OPTION" | "SETTING" => Ok(ConfirmInput::Options),
            _ => Err(()),
        }
    }
}

/// Entries of the options menu. Quality and paper names are accepted directly
/// while the menu is open, so their sub-menus carry no state of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionInput {
    Copies,
    QualityMenu,
    PaperMenu,
    ToggleDuplex,
    Done,
    Quality(Quality),
    Paper(PaperSize),
}

impl FromStr for OptionInput {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "1" => return Ok(OptionInput::Copies),
            "2" => return Ok(OptionInput::QualityMenu),
            "3" => return Ok(OptionInput::PaperMenu),
            "4" => return Ok(OptionInput::ToggleDuplex),
            "5" => return Ok(OptionInput::Done),
            _ => {}
        }
        if let Ok(q) = s.parse::<Quality>() {
            return Ok(OptionInput::Quality(q));
        }
        if let Ok(p) = s.parse::<PaperSize>() {
            return Ok(OptionInput::Paper(p));
        }
        Err(())
    }
}

/// Parse a copies answer: an integer in `1..=max`.
pub fn parse_copies(s: &str, max: u8) -> Option<u8> {
    match s.trim().parse::<u8>() {
        Ok(n) if (1..=max).contains(&n) => Some(n),
        _ => None,
    }
}

/// Which message the desk should render next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Confirm,
    Options,
    AskCopies,
    QualityMenu,
    PaperMenu,
    InvalidConfirm,
    InvalidOption,
    InvalidCopies,
}

/// Side effects requested by a transition, applied in order by the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SetCopies(u8),
    SetQuality(Quality),
    SetPaper(PaperSize),
    ToggleDuplex,
    /// Hand the job to the execution engine.
    Submit,
    /// Remove the job.
    Cancel,
    Reply(Prompt),
}

/// The result of feeding one input to the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Step after the input, or `None` when the session ends.
    pub next: Option<Step>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(step: Step, prompt: Prompt) -> Self {
        Self {
            next: Some(step),
            effects: vec![Effect::Reply(prompt)],
        }
    }

    fn goto(step: Step, effects: Vec<Effect>) -> Self {
        Self {
            next: Some(step),
            effects,
        }
    }

    fn end(effect: Effect) -> Self {
        Self {
            next: None,
            effects: vec![effect],
        }
    }
}

/// Pure transition function of the negotiation dialog.
pub struct Dialog;

impl Dialog {
    /// Compute the transition for `input` received in `step`.
    ///
    /// - `ConfirmPrint`: yes submits, cancel removes the job, options opens
    ///   the menu. Anything else re-prompts.
    /// - `SetOptions`: menu entries 1–5 plus direct quality/paper names.
    /// - `SetCopies`: a number in `1..=max_copies` returns to the menu.
    ///
    /// Unrecognized input never changes the step.
    pub fn next(step: Step, input: &str, max_copies: u8) -> Transition {
        match step {
            Step::ConfirmPrint => match input.parse::<ConfirmInput>() {
                Ok(ConfirmInput::Yes) => Transition::end(Effect::Submit),
                Ok(ConfirmInput::Cancel) => Transition::end(Effect::Cancel),
                Ok(ConfirmInput::Options) => {
                    Transition::stay(Step::SetOptions, Prompt::Options)
                }
                Err(()) => Transition::stay(step, Prompt::InvalidConfirm),
            },
            Step::SetOptions => match input.parse::<OptionInput>() {
                Ok(OptionInput::Copies) => Transition::stay(Step::SetCopies, Prompt::AskCopies),
                Ok(OptionInput::QualityMenu) => Transition::stay(step, Prompt::QualityMenu),
                Ok(OptionInput::PaperMenu) => Transition::stay(step, Prompt::PaperMenu),
                Ok(OptionInput::ToggleDuplex) => Transition::goto(
                    step,
                    vec![Effect::ToggleDuplex, Effect::Reply(Prompt::Options)],
                ),
                Ok(OptionInput::Done) => Transition::stay(Step::ConfirmPrint, Prompt::Confirm),
                Ok(OptionInput::Quality(q)) => Transition::goto(
                    step,
                    vec![Effect::SetQuality(q), Effect::Reply(Prompt::Options)],
                ),
                Ok(OptionInput::Paper(p)) => Transition::goto(
                    step,
                    vec![Effect::SetPaper(p), Effect::Reply(Prompt::Options)],
                ),
                Err(()) => Transition::stay(step, Prompt::InvalidOption),
            },
            Step::SetCopies => match parse_copies(input, max_copies) {
                Some(n) => Transition::goto(
                    Step::SetOptions,
                    vec![Effect::SetCopies(n), Effect::Reply(Prompt::Options)],
                ),
                None => Transition::stay(step, Prompt::InvalidCopies),
            },
        }
    }
}
