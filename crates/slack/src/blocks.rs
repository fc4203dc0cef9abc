use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
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

/// Confirmation Slack shows before a destructive button fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfirmDialog {
    pub title: TextObject,
    pub text: TextObject,
    pub confirm: TextObject,
    pub deny: TextObject,
}

impl ConfirmDialog {
    pub fn new(title: impl Into<String>, text: impl Into<String>, confirm: impl Into<String>) -> Self {
        Self {
            title: TextObject::plain(title),
            text: TextObject::mrkdwn(text),
            confirm: TextObject::plain(confirm),
            deny: TextObject::plain("Cancel"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ConfirmDialog>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
            confirm: None,
        }
    }

    pub fn confirm(mut self, dialog: ConfirmDialog) -> Self {
        self.confirm = Some(dialog);
        self
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

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_option: Option<SelectOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelsSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_channel: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
    StaticSelect(StaticSelectElement),
    ChannelsSelect(ChannelsSelectElement),
}

impl ActionElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::StaticSelect(select) => &select.action_id,
            Self::ChannelsSelect(select) => &select.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
    EmailTextInput {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextSpan {
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    RichTextQuote { elements: Vec<RichTextSpan> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Divider {},
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
    },
    Image {
        image_url: String,
        alt_text: String,
    },
    RichText {
        elements: Vec<RichTextElement>,
    },
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<ActionElement>,
    },
    Context {
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
        optional: bool,
        /// Sends a block action on enter instead of waiting for a modal submit.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        dispatch_action: bool,
    },
}

impl Block {
    /// Blank section used for vertical breathing room.
    pub fn spacer() -> Self {
        Self::Section { block_id: None, text: TextObject::plain(" ") }
    }

    pub fn quote(text: impl Into<String>) -> Self {
        Self::RichText {
            elements: vec![RichTextElement::RichTextQuote {
                elements: vec![RichTextSpan::Text { text: text.into() }],
            }],
        }
    }
}

/// Surface published with `views.publish` or opened with `views.open`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum View {
    Home {
        blocks: Vec<Block>,
    },
    Modal {
        title: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        submit: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        close: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        callback_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        private_metadata: Option<String>,
        blocks: Vec<Block>,
    },
}

impl View {
    pub fn home(blocks: Vec<Block>) -> Self {
        Self::Home { blocks }
    }

    pub fn modal(callback_id: impl Into<String>, title: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self::Modal {
            title: TextObject::plain(title),
            submit: None,
            close: Some(TextObject::plain("Close")),
            callback_id: Some(callback_id.into()),
            private_metadata: None,
            blocks,
        }
    }

    /// Adds a submit button, turning the close button into "Cancel".
    pub fn with_submit(self, label: impl Into<String>) -> Self {
        match self {
            Self::Modal { title, callback_id, private_metadata, blocks, .. } => Self::Modal {
                title,
                submit: Some(TextObject::plain(label)),
                close: Some(TextObject::plain("Cancel")),
                callback_id,
                private_metadata,
                blocks,
            },
            home => home,
        }
    }

    /// Carries `metadata` back in the view submission payload.
    pub fn with_metadata(self, metadata: impl Into<String>) -> Self {
        match self {
            Self::Modal { title, submit, close, callback_id, blocks, .. } => Self::Modal {
                title,
                submit,
                close,
                callback_id,
                private_metadata: Some(metadata.into()),
                blocks,
            },
            home => home,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            Self::Home { blocks } | Self::Modal { blocks, .. } => blocks,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { text: TextObject::plain(text) });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider {});
        self
    }

    pub fn spacer(mut self) -> Self {
        self.blocks.push(Block::spacer());
        self
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn quote(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::quote(text));
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
        self.blocks
            .push(Block::Actions { block_id: Some(block_id.into()), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { elements: builder.build() });
        self
    }

    /// Runs `build` against the builder when `value` is present.
    pub fn maybe<T, F>(self, value: Option<T>, build: F) -> Self
    where
        F: FnOnce(Self, T) -> Self,
    {
        match value {
            Some(value) => build(self, value),
            None => self,
        }
    }

    pub fn extend(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    block_id: Option<String>,
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn block_id(&mut self, block_id: impl Into<String>) -> &mut Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Block {
        Block::Section {
            block_id: self.block_id,
            text: self.text.unwrap_or_else(|| TextObject::plain(" ")),
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    /// Selects without options are skipped, Slack rejects them.
    pub fn select(
        &mut self,
        action_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
        selected: Option<&str>,
    ) -> &mut Self {
        if options.is_empty() {
            return self;
        }
        let initial_option =
            selected.and_then(|value| options.iter().find(|option| option.value == value).cloned());
        self.elements.push(ActionElement::StaticSelect(StaticSelectElement {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options,
            initial_option,
        }));
        self
    }

    pub fn channel_select(
        &mut self,
        action_id: impl Into<String>,
        placeholder: impl Into<String>,
        initial_channel: Option<&str>,
    ) -> &mut Self {
        self.elements.push(ActionElement::ChannelsSelect(ChannelsSelectElement {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            initial_channel: initial_channel.map(str::to_owned),
        }));
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ActionElement, Block, ButtonElement, ButtonStyle, ConfirmDialog, MessageBuilder, SelectOption,
        TextObject, View,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("Weekly Digest")
            .section(|section| {
                section.block_id("summary").mrkdwn("*Summary*");
            })
            .actions("footer", |actions| {
                actions.button(ButtonElement::new("explore_feedback", "Explore Feedback"));
            })
            .build();

        assert_eq!(message.blocks.len(), 3);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { block_id: Some(block_id), text: TextObject::Mrkdwn { .. } }
                if block_id == "summary"
        ));
        assert!(matches!(
            &message.blocks[2],
            Block::Actions { elements, .. } if elements.len() == 1 && elements[0].action_id() == "explore_feedback"
        ));
    }

    #[test]
    fn blocks_serialize_to_slack_wire_shape() {
        let blocks = vec![
            Block::Header { text: TextObject::plain("Monthly Digest") },
            Block::Divider {},
            Block::spacer(),
            Block::quote("Users want examples"),
            Block::Image { image_url: "https://files.test/a.png".to_owned(), alt_text: "api".to_owned() },
        ];

        let value = serde_json::to_value(&blocks).expect("serialize");
        assert_eq!(
            value,
            json!([
                {"type": "header", "text": {"type": "plain_text", "text": "Monthly Digest"}},
                {"type": "divider"},
                {"type": "section", "text": {"type": "plain_text", "text": " "}},
                {"type": "rich_text", "elements": [
                    {"type": "rich_text_quote", "elements": [{"type": "text", "text": "Users want examples"}]}
                ]},
                {"type": "image", "image_url": "https://files.test/a.png", "alt_text": "api"}
            ])
        );
    }

    #[test]
    fn select_keeps_matching_initial_option_only() {
        let message = MessageBuilder::new("filters")
            .actions("filters", |actions| {
                actions
                    .select(
                        "select-origin",
                        "Origin",
                        vec![SelectOption::new("docs", "docs"), SelectOption::new("app", "app")],
                        Some("app"),
                    )
                    .select("select-category", "Category", vec![SelectOption::new("api", "api")], Some("gone"))
                    .button(ButtonElement::new("clear-filters", "Clear").style(ButtonStyle::Danger));
            })
            .build();

        let Block::Actions { elements, .. } = &message.blocks[0] else {
            panic!("expected actions block");
        };
        assert!(matches!(
            &elements[0],
            ActionElement::StaticSelect(select) if select.initial_option.as_ref().map(|o| o.value.as_str()) == Some("app")
        ));
        assert!(matches!(&elements[1], ActionElement::StaticSelect(select) if select.initial_option.is_none()));

        let wire = serde_json::to_value(&elements[2]).expect("serialize");
        assert_eq!(wire["type"], "button");
        assert_eq!(wire["style"], "danger");
    }

    #[test]
    fn settings_controls_serialize_confirm_and_channel_select() {
        let message = MessageBuilder::new("settings")
            .actions("channel", |actions| {
                actions.channel_select("set-channel", "Select a channel", Some("C42")).button(
                    ButtonElement::new("clear-channel", "Clear")
                        .confirm(ConfirmDialog::new("Clear channel?", "Digests stop posting.", "Clear")),
                );
            })
            .build();

        let wire = serde_json::to_value(&message.blocks).expect("serialize");
        assert_eq!(wire[0]["elements"][0]["type"], "channels_select");
        assert_eq!(wire[0]["elements"][0]["initial_channel"], "C42");
        assert_eq!(wire[0]["elements"][1]["confirm"]["confirm"]["text"], "Clear");
        assert_eq!(wire[0]["elements"][1]["confirm"]["text"]["type"], "mrkdwn");
    }

    #[test]
    fn modal_metadata_survives_adding_a_submit_button() {
        let view = View::modal("delete-prompt", "Delete Prompt", Vec::new())
            .with_metadata("17")
            .with_submit("Delete");

        let wire = serde_json::to_value(&view).expect("serialize");
        assert_eq!(wire["private_metadata"], "17");
        assert_eq!(wire["submit"]["text"], "Delete");
        assert_eq!(wire["close"]["text"], "Cancel");
    }
}
