//! Console grammar expressed as a small static AST.
//!
//! The parser and the help surface read the same tables, so keywords and
//! usage strings cannot drift apart.

use crate::config::{ALL_FIELDS, ConfigField, MetricMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Arm,
    Disarm,
    Set,
    Run,
    Status,
    Help,
}

/// Shape of the value accepted by a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    /// `true`/`false` or `on`/`off`.
    Flag,
    /// Decimal literal.
    Number,
    /// One keyword out of a fixed list.
    Keyword(&'static [&'static str]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertySpec {
    pub field: ConfigField,
    pub value: ValueSpec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    /// `<property> [=] <value>` drawn from the property table.
    Assignment(&'static [PropertySpec]),
    /// Duration literal such as `250ms` or `5s`.
    Duration { next: &'static Node },
    /// Optional help topic.
    Topic { next: &'static Node },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

const END: Node = Node::End;

pub const FLAG_KEYWORDS: [&str; 4] = ["true", "false", "on", "off"];

const MODE_KEYWORDS: [&str; 2] = [
    MetricMode::MagnitudeDifference.keyword(),
    MetricMode::SeparationDifference.keyword(),
];

const fn property(field: ConfigField) -> PropertySpec {
    let value = match field {
        ConfigField::Armed => ValueSpec::Flag,
        ConfigField::VoltCompareMode => ValueSpec::Keyword(&MODE_KEYWORDS),
        _ => ValueSpec::Number,
    };
    PropertySpec { field, value }
}

const PROPERTIES: [PropertySpec; ALL_FIELDS.len()] = [
    property(ALL_FIELDS[0]),
    property(ALL_FIELDS[1]),
    property(ALL_FIELDS[2]),
    property(ALL_FIELDS[3]),
    property(ALL_FIELDS[4]),
    property(ALL_FIELDS[5]),
    property(ALL_FIELDS[6]),
    property(ALL_FIELDS[7]),
];

const SET_GRAMMAR: Node = Node::Assignment(&PROPERTIES);

const RUN_GRAMMAR: Node = Node::Duration { next: &END };

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 6] = [
    CommandSpec {
        name: "arm",
        tag: CommandTag::Arm,
        grammar: &END,
        usage: "arm",
        summary: "arm the monitor for one close",
    },
    CommandSpec {
        name: "disarm",
        tag: CommandTag::Disarm,
        grammar: &END,
        usage: "disarm",
        summary: "stop monitoring and clear dwell",
    },
    CommandSpec {
        name: "set",
        tag: CommandTag::Set,
        grammar: &SET_GRAMMAR,
        usage: "set <property> <value>",
        summary: "change one configuration property",
    },
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        grammar: &RUN_GRAMMAR,
        usage: "run <duration>",
        summary: "advance simulated time",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "display monitor and metric state",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [topic]",
        summary: "show help for a command or property",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Returns the property table used by `set`.
#[must_use]
pub const fn properties() -> &'static [PropertySpec] {
    &PROPERTIES
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Finds a property by keyword (case insensitive).
#[must_use]
pub fn find_property(name: &str) -> Option<&'static PropertySpec> {
    let field = ConfigField::from_keyword(name)?;
    PROPERTIES.iter().find(|spec| spec.field == field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_config_field_is_settable() {
        for field in ALL_FIELDS {
            assert!(find_property(field.keyword()).is_some(), "{field:?}");
        }
    }

    #[test]
    fn property_value_shapes() {
        assert_eq!(
            find_property("armed").map(|spec| spec.value),
            Some(ValueSpec::Flag)
        );
        assert_eq!(
            find_property("VOLT_COMPARE_MODE").map(|spec| spec.value),
            Some(ValueSpec::Keyword(&["mag_diff", "sep_diff"]))
        );
        assert_eq!(
            find_property("metrics_period").map(|spec| spec.value),
            Some(ValueSpec::Number)
        );
    }

    #[test]
    fn command_lookup_is_case_insensitive() {
        assert_eq!(find("DisArm").map(|spec| spec.tag), Some(CommandTag::Disarm));
        assert!(find("close").is_none());
    }
}
