use chrono::NaiveDate;
use serde::Serialize;

use deskbook_core::domain::booking::Booking;
use deskbook_core::domain::desk::DeskId;

pub const OPEN_BOOKING_MODAL_ACTION: &str = "open_booking_modal";
/// Slack rejects section text longer than this.
const MAX_SECTION_TEXT_CHARS: usize = 3000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A selectable entry of a radio group or static select.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
}

impl OptionObject {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Button(ButtonElement),
    RadioButtons {
        action_id: String,
        options: Vec<OptionObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_option: Option<OptionObject>,
    },
    Datepicker {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_date: Option<String>,
        placeholder: TextObject,
    },
    StaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<OptionObject>,
    },
}

impl BlockElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::RadioButtons { action_id, .. }
            | Self::Datepicker { action_id, .. }
            | Self::StaticSelect { action_id, .. } => action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        block_id: String,
        text: TextObject,
    },
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<BlockElement>,
    },
    Divider,
    Image {
        image_url: String,
        alt_text: String,
    },
    Actions {
        block_id: String,
        elements: Vec<BlockElement>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: BlockElement,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        dispatch_action: bool,
    },
}

impl Block {
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::Header { block_id, .. }
            | Self::Section { block_id, .. }
            | Self::Actions { block_id, .. }
            | Self::Input { block_id, .. } => Some(block_id),
            Self::Divider | Self::Image { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// A message with no blocks; Slack renders the fallback text as-is.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

/// Slack modal view payload as accepted by `views.open` and `views.update`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<String>,
    pub title: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(title: impl Into<String>, close: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            kind: "modal",
            callback_id: None,
            private_metadata: None,
            title: TextObject::plain(title),
            submit: None,
            close: TextObject::plain(close),
            blocks,
        }
    }

    pub fn callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    pub fn private_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.private_metadata = Some(metadata.into());
        self
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(TextObject::plain(label));
        self
    }

    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.block_id() == Some(block_id))
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks
            .push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn image(mut self, image_url: impl Into<String>, alt_text: impl Into<String>) -> Self {
        self.blocks.push(Block::Image { image_url: image_url.into(), alt_text: alt_text.into() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: BlockElement,
        dispatch_action: bool,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            dispatch_action,
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<BlockElement>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: BlockElement) -> &mut Self {
        self.accessory = Some(element);
        self
    }

    fn build(self) -> (TextObject, Option<BlockElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain(" ")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<BlockElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(BlockElement::Button(button));
        self
    }

    fn build(self) -> Vec<BlockElement> {
        self.elements
    }
}

/// Roster announcement for `target_date`, one line per booking in the order given.
pub fn office_status_message(target_date: NaiveDate, bookings: &[Booking]) -> MessageTemplate {
    let day_name = target_date.format("%A").to_string();
    let iso_date = target_date.format("%Y-%m-%d").to_string();

    let roster = if bookings.is_empty() {
        vec!["The office is currently empty. 👻".to_owned()]
    } else {
        roster_chunks(
            bookings
                .iter()
                .map(|booking| format!("• <@{}> ➝ *{}*", booking.user_id, booking.desk_id)),
        )
    };

    let mut builder = MessageBuilder::new(format!("Office status for {iso_date}"))
        .header("office_status.header", format!("🏢 Office Status: {day_name}"))
        .section("office_status.intro", |section| {
            section.mrkdwn(format!(
                "On *{day_name}, {iso_date}*, the following people will be in the office:"
            ));
        })
        .divider();
    for (index, chunk) in roster.into_iter().enumerate() {
        let block_id = match index {
            0 => "office_status.roster".to_owned(),
            n => format!("office_status.roster.{}", n + 1),
        };
        builder = builder.section(block_id, |section| {
            section.mrkdwn(chunk);
        });
    }

    builder
        .actions("office_status.actions", |actions| {
            actions.button(
                ButtonElement::new(OPEN_BOOKING_MODAL_ACTION, "I'm coming too! (Book)")
                    .style(ButtonStyle::Primary),
            );
        })
        .build()
}

/// Joins roster lines into section texts that each stay within Slack's
/// per-section limit.
fn roster_chunks(lines: impl Iterator<Item = String>) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in lines {
        let line_chars = line.chars().count();
        if !current.is_empty() && current_chars + 1 + line_chars > MAX_SECTION_TEXT_CHARS {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&line);
        current_chars += line_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn booking_confirmation_message(desk_id: &DeskId, date: NaiveDate) -> MessageTemplate {
    MessageTemplate::text_only(format!(
        "✅ Success! You booked *{desk_id}* for {}.",
        date.format("%Y-%m-%d")
    ))
}
