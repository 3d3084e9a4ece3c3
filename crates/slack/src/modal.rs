//! Booking dialog state machine and the dialogs the bot opens.
//!
//! The booking dialog is re-rendered from scratch on every field change. Its
//! state travels with the view as `private_metadata`, so nothing is kept
//! server-side between round-trips.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use deskbook_core::domain::booking::Booking;
use deskbook_core::domain::desk::DeskId;
use deskbook_core::errors::DomainError;
use deskbook_core::schedule;

use crate::blocks::{
    BlockElement, ButtonElement, ButtonStyle, MessageBuilder, ModalView, OptionObject, TextObject,
};

pub const BOOKING_CALLBACK_ID: &str = "booking_submission";
pub const DATE_SELECTION_BLOCK: &str = "date_selection_block";
pub const DATE_RADIO_ACTION: &str = "date_radio_action";
pub const DATEPICKER_BLOCK: &str = "datepicker_block";
pub const DATE_PICKER_ACTION: &str = "date_picker_action";
pub const DESK_SELECT_BLOCK: &str = "desk_select_block";
pub const DESK_SELECT_ACTION: &str = "desk_selected";
pub const DESKS_FULL_BLOCK: &str = "desks_full_block";
pub const DELETE_BOOKING_ACTION: &str = "delete_booking";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateIntent {
    #[default]
    Today,
    Tomorrow,
    #[serde(rename = "later")]
    Custom,
}

impl DateIntent {
    pub fn option_value(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Custom => "later",
        }
    }
}

/// What the user just did inside the booking dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModalEvent {
    PickToday,
    PickTomorrow,
    PickCustom,
    PickDate(NaiveDate),
}

impl ModalEvent {
    /// Maps a radio option value; `None` for values this dialog never renders.
    pub fn from_radio_value(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Self::PickToday),
            "tomorrow" => Some(Self::PickTomorrow),
            "later" => Some(Self::PickCustom),
            _ => None,
        }
    }

    pub fn from_picked_date(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok().map(Self::PickDate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalState {
    pub selected_date: NaiveDate,
    #[serde(default)]
    pub date_intent: DateIntent,
}

impl ModalState {
    pub fn initial(today: NaiveDate) -> Self {
        Self { selected_date: today, date_intent: DateIntent::Today }
    }

    /// Next dialog state. Picking Custom keeps the previously selected date
    /// (today when the dialog had no readable state).
    pub fn transition(previous: Option<&ModalState>, event: ModalEvent, today: NaiveDate) -> Self {
        match event {
            ModalEvent::PickToday => Self { selected_date: today, date_intent: DateIntent::Today },
            ModalEvent::PickTomorrow => Self {
                selected_date: schedule::tomorrow(today),
                date_intent: DateIntent::Tomorrow,
            },
            ModalEvent::PickCustom => Self {
                selected_date: previous.map(|state| state.selected_date).unwrap_or(today),
                date_intent: DateIntent::Custom,
            },
            ModalEvent::PickDate(date) => {
                Self { selected_date: date, date_intent: DateIntent::Custom }
            }
        }
    }

    pub fn to_metadata(&self) -> String {
        serde_json::json!({
            "selected_date": self.selected_date.format(DATE_FORMAT).to_string(),
            "date_intent": self.date_intent.option_value(),
        })
        .to_string()
    }

    pub fn from_metadata(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw).map_err(|error| {
            DomainError::InvalidDialogState(format!("unreadable booking dialog metadata: {error}"))
        })
    }
}

fn date_options(today: NaiveDate) -> [OptionObject; 3] {
    [
        OptionObject::new(
            format!("Today ({})", today.format(DATE_FORMAT)),
            DateIntent::Today.option_value(),
        ),
        OptionObject::new(
            format!("Tomorrow ({})", schedule::tomorrow(today).format(DATE_FORMAT)),
            DateIntent::Tomorrow.option_value(),
        ),
        OptionObject::new("Later / Pick date", DateIntent::Custom.option_value()),
    ]
}

/// Renders the booking dialog. Pure in its inputs, so the same state always
/// produces the same view.
pub fn booking_modal(
    state: &ModalState,
    available: &[DeskId],
    today: NaiveDate,
    map_image_url: &str,
) -> ModalView {
    let options = date_options(today);
    let initial = match state.date_intent {
        DateIntent::Today => options[0].clone(),
        DateIntent::Tomorrow => options[1].clone(),
        DateIntent::Custom => options[2].clone(),
    };
    let selected_date = state.selected_date.format(DATE_FORMAT).to_string();

    let mut builder = MessageBuilder::new("Desk Booking").input(
        DATE_SELECTION_BLOCK,
        "When are you coming to the office?",
        BlockElement::RadioButtons {
            action_id: DATE_RADIO_ACTION.to_owned(),
            options: options.to_vec(),
            initial_option: Some(initial),
        },
        true,
    );

    if state.date_intent == DateIntent::Custom {
        let initial_date = selected_date.clone();
        builder = builder.section(DATEPICKER_BLOCK, |section| {
            section.mrkdwn("*Select a specific date:*").accessory(BlockElement::Datepicker {
                action_id: DATE_PICKER_ACTION.to_owned(),
                initial_date: Some(initial_date),
                placeholder: TextObject::plain("Select date"),
            });
        });
    }

    builder = builder
        .divider()
        .image(map_image_url, "Office Map")
        .section("desk_summary_block", |section| {
            section.mrkdwn(format!("Available desks on: *{selected_date}*"));
        });

    if available.is_empty() {
        builder = builder.section(DESKS_FULL_BLOCK, |section| {
            section.mrkdwn("⚠️ *All desks are taken!*");
        });
    } else {
        builder = builder.input(
            DESK_SELECT_BLOCK,
            "Choose a desk:",
            BlockElement::StaticSelect {
                action_id: DESK_SELECT_ACTION.to_owned(),
                placeholder: TextObject::plain("Select..."),
                options: available
                    .iter()
                    .map(|desk| OptionObject::new(format!("🖥 {desk}"), desk.as_str()))
                    .collect(),
            },
            false,
        );
    }

    let view = ModalView::new("Desk Booking", "Cancel", builder.into_blocks())
        .callback_id(BOOKING_CALLBACK_ID)
        .private_metadata(state.to_metadata());

    if available.is_empty() {
        view
    } else {
        view.submit("Book")
    }
}

/// Upcoming bookings of one user, each with a delete button.
pub fn my_bookings_modal(bookings: &[Booking]) -> ModalView {
    let mut builder =
        MessageBuilder::new("My Bookings").header("my_bookings.header", "My Bookings");

    if bookings.is_empty() {
        builder = builder.section("my_bookings.empty", |section| {
            section.mrkdwn("You have no upcoming bookings.");
        });
    }
    for booking in bookings {
        builder = builder.section(format!("my_bookings.{}", booking.id), |section| {
            section
                .mrkdwn(format!(
                    "📅 *{}* | 🖥 *{}*",
                    booking.booking_date.format(DATE_FORMAT),
                    booking.desk_id
                ))
                .accessory(BlockElement::Button(
                    ButtonElement::new(DELETE_BOOKING_ACTION, "Delete")
                        .style(ButtonStyle::Danger)
                        .value(booking.id.to_string()),
                ));
        });
    }

    ModalView::new("Manage Bookings", "Close", builder.into_blocks())
}

pub fn who_is_here_modal(today: NaiveDate, bookings: &[Booking]) -> ModalView {
    let roster = if bookings.is_empty() {
        "👻 The office is empty today.".to_owned()
    } else {
        bookings
            .iter()
            .map(|booking| format!("• <@{}> is at *{}*", booking.user_id, booking.desk_id))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let blocks = MessageBuilder::new("Office Status")
        .header(
            "who_is_here.header",
            format!("In the Office Today ({})", today.format(DATE_FORMAT)),
        )
        .divider()
        .section("who_is_here.roster", |section| {
            section.mrkdwn(roster);
        })
        .into_blocks();

    ModalView::new("Office Status", "Cool", blocks)
}
