//! Which country's detail panel is open.
//!
//! A request that carries no event leaves the selection alone. That is what
//! keeps the panel open while the year or indicator controls are used, and
//! why choosing the already selected country again keeps it selected instead
//! of toggling it off.

use crate::error::Notice;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "country", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Unselected,
    Selected(String),
}

/// What the user did on this request, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Nothing selection-related happened (e.g. only the year changed).
    None,
    /// Map click; `None` when the click hit background rather than a country.
    Click(Option<String>),
    /// Manual selector choice.
    Pick(String),
    Dismiss,
}

/// Label of the selector entry that clears the selection.
pub const ALL_COUNTRIES: &str = "All";

impl SelectionEvent {
    /// Builds an event from the `event` and `country` request parameters.
    pub fn from_params(event: Option<&str>, country: Option<&str>) -> Self {
        let country = country.map(str::trim).filter(|c| !c.is_empty());
        match event.map(str::trim) {
            Some("click") => SelectionEvent::Click(country.map(str::to_ascii_uppercase)),
            Some("pick") => match country {
                Some(c) if c.eq_ignore_ascii_case(ALL_COUNTRIES) => SelectionEvent::Dismiss,
                Some(c) => SelectionEvent::Pick(c.to_ascii_uppercase()),
                None => SelectionEvent::Dismiss,
            },
            Some("dismiss") => SelectionEvent::Dismiss,
            _ => SelectionEvent::None,
        }
    }
}

impl Selection {
    pub fn country(&self) -> Option<&str> {
        match self {
            Selection::Unselected => None,
            Selection::Selected(id) => Some(id),
        }
    }

    /// Applies one event. `is_known` says whether a code exists in the dataset.
    ///
    /// Targets that are not known countries clear the selection and report a
    /// notice, for clicks and picks alike.
    pub fn apply(&self, event: SelectionEvent, is_known: impl Fn(&str) -> bool) -> (Selection, Option<Notice>) {
        match event {
            SelectionEvent::None => (self.clone(), None),
            SelectionEvent::Dismiss => (Selection::Unselected, None),
            SelectionEvent::Click(Some(id)) | SelectionEvent::Pick(id) => {
                if is_known(&id) {
                    (Selection::Selected(id), None)
                } else {
                    (
                        Selection::Unselected,
                        Some(Notice::UnresolvedClickTarget { target: Some(id) }),
                    )
                }
            }
            SelectionEvent::Click(None) => (
                Selection::Unselected,
                Some(Notice::UnresolvedClickTarget { target: None }),
            ),
        }
    }
}
