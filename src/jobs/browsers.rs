use anyhow::Result;
use tracing::trace;

use super::{Mapper, SkipReason};
use crate::extract::{extract_field, FieldSpec};
use crate::useragent::{Category, UserAgentParser};

/// Access-log mapper: extracts the user-agent field, classifies it and emits
/// the selected category
pub struct BrowserCounter {
    field: FieldSpec,
    category: Category,
    parser: UserAgentParser,
}

impl BrowserCounter {
    /// Build the classifier for one partition
    pub fn setup(field: FieldSpec, category: Category) -> Result<Self> {
        Ok(Self {
            field,
            category,
            parser: UserAgentParser::new()?,
        })
    }
}

impl Mapper for BrowserCounter {
    fn name(&self) -> &'static str {
        "browsers"
    }

    fn map(&mut self, record: &str, emit: &mut dyn FnMut(&str)) -> Result<(), SkipReason> {
        let raw = extract_field(record, &self.field)?;
        let agent = self.parser.parse(raw)?;
        emit(agent.label(self.category));
        Ok(())
    }

    fn teardown(self: Box<Self>) {
        let BrowserCounter { parser, .. } = *self;
        drop(parser);
        trace!("user-agent parser released");
    }
}
