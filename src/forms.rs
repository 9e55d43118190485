//! Headless form-session state machine for the create/edit dialogs. One
//! session tracks one kind of form (event, participant, or payment); at most
//! one form of a kind is open, and at most one request per form is in
//! flight. On success the caller is told to reload the whole event from the
//! server instead of patching local state, so the view always shows exactly
//! what was stored.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum FormState<R> {
    /// No form open.
    Hidden,
    /// Create form open, possibly showing a previous submit error.
    Creating,
    /// Edit form open over an existing record.
    Editing(R),
    /// A request is in flight; the submit control is disabled.
    Submitting(Origin<R>),
}

/// Where a submit came from, so a failure can reopen the right form.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin<R> {
    Create,
    Edit(R),
}

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("a form of this kind is already open")]
    AlreadyOpen,
    #[error("no form is open")]
    NotOpen,
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error("no request is in flight")]
    NotSubmitting,
}

/// Instruction to the parent view: re-fetch the full event.
#[derive(Debug, PartialEq, Eq)]
pub struct ReloadParent;

#[derive(Debug)]
pub struct FormSession<R> {
    state: FormState<R>,
    error: Option<String>,
}

impl<R: Clone> FormSession<R> {
    pub fn new() -> Self {
        Self {
            state: FormState::Hidden,
            error: None,
        }
    }

    pub fn state(&self) -> &FormState<R> {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, FormState::Hidden)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, FormState::Submitting(_))
    }

    pub fn open_create(&mut self) -> Result<(), FormError> {
        match self.state {
            FormState::Hidden => {
                self.state = FormState::Creating;
                self.error = None;
                Ok(())
            }
            _ => Err(FormError::AlreadyOpen),
        }
    }

    pub fn open_edit(&mut self, record: R) -> Result<(), FormError> {
        match self.state {
            FormState::Hidden => {
                self.state = FormState::Editing(record);
                self.error = None;
                Ok(())
            }
            _ => Err(FormError::AlreadyOpen),
        }
    }

    /// Closes an open form without submitting. An in-flight request cannot
    /// be cancelled.
    pub fn cancel(&mut self) -> Result<(), FormError> {
        match self.state {
            FormState::Hidden => Err(FormError::NotOpen),
            FormState::Submitting(_) => Err(FormError::RequestInFlight),
            _ => {
                self.state = FormState::Hidden;
                self.error = None;
                Ok(())
            }
        }
    }

    /// Marks the form's request as started. Rejected while a request is
    /// already in flight, which is what disables the submit control.
    pub fn begin_submit(&mut self) -> Result<(), FormError> {
        let next = match &self.state {
            FormState::Hidden => return Err(FormError::NotOpen),
            FormState::Submitting(_) => return Err(FormError::RequestInFlight),
            FormState::Creating => Origin::Create,
            FormState::Editing(record) => Origin::Edit(record.clone()),
        };
        self.state = FormState::Submitting(next);
        self.error = None;
        Ok(())
    }

    /// The request succeeded: the form closes and the parent view must
    /// reload the event.
    pub fn succeed(&mut self) -> Result<ReloadParent, FormError> {
        match self.state {
            FormState::Submitting(_) => {
                self.state = FormState::Hidden;
                self.error = None;
                Ok(ReloadParent)
            }
            _ => Err(FormError::NotSubmitting),
        }
    }

    /// The request failed: the form reopens where it came from, showing one
    /// generic message. No retry happens on its own.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), FormError> {
        let reopened = match &self.state {
            FormState::Submitting(Origin::Create) => FormState::Creating,
            FormState::Submitting(Origin::Edit(record)) => FormState::Editing(record.clone()),
            _ => return Err(FormError::NotSubmitting),
        };
        self.state = reopened;
        self.error = Some(message.into());
        Ok(())
    }
}

impl<R: Clone> Default for FormSession<R> {
    fn default() -> Self {
        Self::new()
    }
}
