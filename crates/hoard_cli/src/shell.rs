//! Interactive command loop.
//!
//! # Responsibility
//! - Parse one input line into a [`Command`] and run it against the service.
//! - Drive the guided add/edit prompts and the result selection menu.
//!
//! # Invariants
//! - Service errors are printed and the loop keeps going.
//! - EOF, an exit command or a confirmed interrupt ends the loop cleanly.
//! - The shell holds no entity state between commands.

use crate::interrupt::InterruptFlag;
use crate::render;
use hoard_core::model::entity::parse_tag_list;
use hoard_core::{
    Attributes, Entity, EntityChanges, EntityId, EntityRepository, EntityService, NewEntity,
    RepoResult, SearchHit,
};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Inputs that leave the shell wherever a command is read.
pub const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", ":q"];

const SEARCH_PROMPT: &str = "\nSearch> ";
const RAW_JSON_COMMAND: &str = ":raw";
const EMPTY_INPUT_HINT: &str =
    "Type a search term, or `add` to create a new entity, or `quit` to exit.";

static ATTRIBUTE_QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^=]+?)\s*=\s*(.*)$").expect("valid attribute query regex")
});

/// One parsed line at the `Search>` prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Exit,
    Help,
    Add,
    List,
    View(EntityId),
    Edit(EntityId),
    Delete(EntityId),
    Attr { key: String, value: String },
    Search(String),
    Invalid(&'static str),
}

impl Command {
    /// Parses a line. Anything that is not a command is a search.
    ///
    /// `view`, `edit` and `delete` only act as commands when followed by a
    /// numeric id, so `view of the bay` is still a search.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if is_exit_command(line) {
            return Self::Exit;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let head = head.to_lowercase();

        match (head.as_str(), rest) {
            ("help", "") => Self::Help,
            ("add" | "new", "") => Self::Add,
            ("list", "") => Self::List,
            ("view", "") => Self::Invalid("usage: view <id>"),
            ("edit", "") => Self::Invalid("usage: edit <id>"),
            ("delete", "") => Self::Invalid("usage: delete <id>"),
            ("attr", arg) => match ATTRIBUTE_QUERY_RE.captures(arg) {
                Some(captures) => Self::Attr {
                    key: captures[1].trim().to_string(),
                    value: captures[2].trim().to_string(),
                },
                None => Self::Invalid("usage: attr <key>=<value>"),
            },
            ("view" | "edit" | "delete", arg) => match arg.parse::<i64>() {
                Ok(raw) => {
                    let id = EntityId(raw);
                    match head.as_str() {
                        "view" => Self::View(id),
                        "edit" => Self::Edit(id),
                        _ => Self::Delete(id),
                    }
                }
                Err(_) => Self::Search(line.to_string()),
            },
            _ => Self::Search(line.to_string()),
        }
    }
}

fn is_exit_command(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&lowered.as_str())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug)]
enum ShellError {
    Io(io::Error),
    /// The user asked to leave.
    Exit,
}

impl From<io::Error> for ShellError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

type ShellResult<T> = Result<T, ShellError>;

/// Values collected by the guided prompts.
struct EntityForm {
    category: String,
    name: String,
    notes: String,
    tags: Vec<String>,
    attributes: Attributes,
}

impl EntityForm {
    fn into_new_entity(self) -> NewEntity {
        NewEntity::new(self.category, self.name)
            .with_notes(self.notes)
            .with_tags(self.tags)
            .with_attributes(self.attributes)
    }

    /// Only the fields that differ from `current`.
    fn changes_from(self, current: &Entity) -> EntityChanges {
        EntityChanges {
            category: (self.category != current.category).then_some(self.category),
            name: (self.name != current.name).then_some(self.name),
            notes: (self.notes != current.notes).then_some(self.notes),
            tags: (self.tags != current.tags).then_some(self.tags),
            attributes: (self.attributes != current.attributes).then_some(self.attributes),
        }
    }
}

/// Line-oriented shell over any reader and writer.
pub struct Shell<'s, R, In, Out>
where
    R: EntityRepository,
{
    service: &'s EntityService<R>,
    input: In,
    output: Out,
    interrupt: InterruptFlag,
}

impl<'s, R, In, Out> Shell<'s, R, In, Out>
where
    R: EntityRepository,
    In: BufRead,
    Out: Write,
{
    pub fn new(
        service: &'s EntityService<R>,
        input: In,
        output: Out,
        interrupt: InterruptFlag,
    ) -> Self {
        Self {
            service,
            input,
            output,
            interrupt,
        }
    }

    /// Prints the banner and processes commands until the user leaves.
    ///
    /// Only terminal I/O failures are returned.
    pub fn run(&mut self, db_path: &Path) -> io::Result<()> {
        let count = match self.service.count() {
            Ok(count) => count,
            Err(err) => {
                warn!("event=shell_start module=cli status=error error={err}");
                0
            }
        };
        let banner = render::banner(
            db_path,
            count,
            self.service.capabilities(),
            self.service.matcher_kind(),
        );
        writeln!(self.output, "{banner}")?;

        loop {
            match self.step() {
                Ok(()) => {}
                Err(ShellError::Exit) => {
                    self.output.flush()?;
                    return Ok(());
                }
                Err(ShellError::Io(err)) => return Err(err),
            }
        }
    }

    fn step(&mut self) -> ShellResult<()> {
        let line = self.prompt(SEARCH_PROMPT)?;
        match Command::parse(&line) {
            Command::Empty => self.say(EMPTY_INPUT_HINT),
            Command::Exit => Err(ShellError::Exit),
            Command::Help => self.say(render::HELP_TEXT),
            Command::Add => self.add(None),
            Command::List => self.list(),
            Command::View(id) => self.view(id),
            Command::Edit(id) => self.edit(id),
            Command::Delete(id) => self.delete(id).map(|_| ()),
            Command::Attr { key, value } => self.attr(&key, &value),
            Command::Search(query) => self.search(&query),
            Command::Invalid(usage) => self.say(usage),
        }
    }

    fn search(&mut self, query: &str) -> ShellResult<()> {
        let Some(hits) = self.report(self.service.find(query))? else {
            return Ok(());
        };
        if hits.is_empty() {
            let answer = self.prompt("No matches found. Create new entity with this name? [Y/n]: ")?;
            let answer = answer.trim();
            if answer.is_empty() || is_yes(answer) {
                return self.add(Some(query));
            }
            return Ok(());
        }
        self.select(&hits)
    }

    fn select(&mut self, hits: &[SearchHit]) -> ShellResult<()> {
        self.say(render::search_results(hits))?;
        self.say("a) Add new entity\ns) Search again\nq) Quit")?;
        loop {
            let choice = self.prompt("Choose number to open, or command: ")?;
            let choice = choice.trim().to_lowercase();
            match choice.as_str() {
                "" => continue,
                "a" | "add" => return self.add(None),
                "s" | "search" => return Ok(()),
                "q" => return Err(ShellError::Exit),
                other if is_exit_command(other) => return Err(ShellError::Exit),
                other => {
                    let picked = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|number| number.checked_sub(1))
                        .and_then(|position| hits.get(position));
                    match picked {
                        Some(hit) => return self.open(hit.entity.id),
                        None => self.say("Invalid choice")?,
                    }
                }
            }
        }
    }

    /// Shows one entity, then loops on the action menu.
    fn open(&mut self, id: EntityId) -> ShellResult<()> {
        self.view(id)?;
        loop {
            let action = self.prompt("[v]iew [e]dit [d]elete [b]ack: ")?;
            let action = action.trim().to_lowercase();
            match action.as_str() {
                "" | "v" | "view" => self.view(id)?,
                "e" | "edit" => self.edit(id)?,
                "d" | "delete" => {
                    if self.delete(id)? {
                        return Ok(());
                    }
                }
                "b" | "back" => return Ok(()),
                other if is_exit_command(other) => return Err(ShellError::Exit),
                _ => self.say("Unknown action")?,
            }
        }
    }

    fn add(&mut self, name_hint: Option<&str>) -> ShellResult<()> {
        let form = self.fill_form(None, name_hint)?;
        if let Some(entity) = self.report(self.service.create(&form.into_new_entity()))? {
            self.say(format!("Created entity {}", entity.id))?;
        }
        Ok(())
    }

    fn edit(&mut self, id: EntityId) -> ShellResult<()> {
        let Some(current) = self.report(self.service.get(id))? else {
            return Ok(());
        };
        let changes = self.fill_form(Some(&current), None)?.changes_from(&current);
        if changes.is_empty() {
            return self.say("No changes.");
        }
        if self.report(self.service.edit(id, &changes))?.is_some() {
            self.say("Updated.")?;
        }
        Ok(())
    }

    /// Returns whether the entity was deleted.
    fn delete(&mut self, id: EntityId) -> ShellResult<bool> {
        let Some(entity) = self.report(self.service.get(id))? else {
            return Ok(false);
        };
        self.say(render::entity_line(&entity))?;
        let answer = self.prompt("Confirm delete? This cannot be undone. [y/N]: ")?;
        if !is_yes(&answer) {
            return Ok(false);
        }
        if self.report(self.service.remove(id))?.is_some() {
            self.say("Deleted.")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn view(&mut self, id: EntityId) -> ShellResult<()> {
        if let Some(entity) = self.report(self.service.get(id))? {
            self.say(render::entity_detail(&entity))?;
        }
        Ok(())
    }

    fn list(&mut self) -> ShellResult<()> {
        let Some(entities) = self.report(self.service.all())? else {
            return Ok(());
        };
        if entities.is_empty() {
            return self.say("No entities yet.");
        }
        self.say_entities(&entities)
    }

    fn attr(&mut self, key: &str, value: &str) -> ShellResult<()> {
        let Some(entities) = self.report(self.service.find_by_attribute(key, value))? else {
            return Ok(());
        };
        if entities.is_empty() {
            return self.say("No matches.");
        }
        self.say_entities(&entities)
    }

    fn say_entities(&mut self, entities: &[Entity]) -> ShellResult<()> {
        for entity in entities {
            self.say(render::entity_line(entity))?;
        }
        Ok(())
    }

    fn fill_form(
        &mut self,
        existing: Option<&Entity>,
        name_hint: Option<&str>,
    ) -> ShellResult<EntityForm> {
        let category = self.prompt_required(
            "Category (person/website/feature/etc)",
            existing.map(|entity| entity.category.as_str()),
        )?;
        let name = self.prompt_required(
            "Name",
            existing.map(|entity| entity.name.as_str()).or(name_hint),
        )?;
        let notes = self.prompt_optional("Notes", existing.map(|entity| entity.notes.as_str()))?;
        let current_tags = existing.map(|entity| entity.tags.join(", "));
        let tags = self.prompt_optional("Tags (comma-separated)", current_tags.as_deref())?;
        let attributes = self.prompt_attributes(
            existing
                .map(|entity| entity.attributes.clone())
                .unwrap_or_default(),
        )?;

        Ok(EntityForm {
            category,
            name,
            notes,
            tags: parse_tag_list(&tags),
            attributes,
        })
    }

    /// Re-asks until a non-blank value (or a non-blank default) is available.
    fn prompt_required(&mut self, label: &str, current: Option<&str>) -> ShellResult<String> {
        loop {
            let value = self.prompt_optional(label, current)?;
            if !value.trim().is_empty() {
                return Ok(value);
            }
            self.say(format!("{label} is required."))?;
        }
    }

    /// Blank input keeps `current`.
    fn prompt_optional(&mut self, label: &str, current: Option<&str>) -> ShellResult<String> {
        let current = current.unwrap_or("");
        let answer = self.prompt(&format!("{label} [{current}]: "))?;
        let answer = answer.trim();
        if answer.is_empty() {
            Ok(current.to_string())
        } else {
            Ok(answer.to_string())
        }
    }

    fn prompt_attributes(&mut self, mut attributes: Attributes) -> ShellResult<Attributes> {
        self.say(
            "Enter attributes as key/value pairs. Leave key blank to finish. Type ':raw' to edit raw JSON.",
        )?;
        loop {
            let key = self.prompt("attribute key: ")?;
            let key = key.trim();
            if key.is_empty() {
                return Ok(attributes);
            }
            if key == RAW_JSON_COMMAND {
                if let Some(replacement) = self.prompt_raw_json(&attributes)? {
                    attributes = replacement;
                }
                return Ok(attributes);
            }
            let value = self.prompt(&format!("value for {key}: "))?;
            attributes.insert(key.to_string(), serde_json::Value::String(value));
        }
    }

    /// Reads a JSON object terminated by an empty line or EOF.
    ///
    /// Returns `None` when the text does not parse; the caller keeps the
    /// previous attributes.
    fn prompt_raw_json(&mut self, current: &Attributes) -> ShellResult<Option<Attributes>> {
        let current_text = serde_json::to_string_pretty(current).unwrap_or_else(|_| "{}".into());
        self.say(format!("Current:\n{current_text}"))?;
        self.say("Enter raw JSON (single line or multi-line). End with an empty line on its own.")?;
        self.output.flush()?;

        let mut lines = Vec::new();
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            lines.push(line);
        }

        match serde_json::from_str::<Attributes>(lines.join("\n").trim()) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                self.say(format!("Invalid JSON: {err}"))?;
                Ok(None)
            }
        }
    }

    /// Prints `text` and reads one line. EOF ends the session.
    fn prompt(&mut self, text: &str) -> ShellResult<String> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        self.read_line()?.ok_or(ShellError::Exit)
    }

    /// Reads one line without its terminator; `None` at EOF.
    ///
    /// A pending interrupt turns the line into the answer to the exit
    /// confirmation printed by the signal handler.
    fn read_line(&mut self) -> ShellResult<Option<String>> {
        loop {
            let mut line = String::new();
            let read = self.input.read_line(&mut line)?;
            if self.interrupt.take() {
                if read == 0 || is_yes(&line) {
                    return Err(ShellError::Exit);
                }
                continue;
            }
            if read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\r', '\n']).len();
            line.truncate(trimmed);
            return Ok(Some(line));
        }
    }

    fn say(&mut self, text: impl Display) -> ShellResult<()> {
        writeln!(self.output, "{text}")?;
        Ok(())
    }

    /// Prints a service error and turns it into `None`.
    fn report<T>(&mut self, result: RepoResult<T>) -> ShellResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("event=shell_command module=cli status=error error={err}");
                self.say(format!("Error: {err}"))?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Command;
    use hoard_core::EntityId;

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert_eq!(Command::parse("quit"), Command::Exit);
        assert_eq!(Command::parse(" EXIT "), Command::Exit);
        assert_eq!(Command::parse(":q"), Command::Exit);
    }

    #[test]
    fn id_commands_need_a_number() {
        assert_eq!(Command::parse("view 3"), Command::View(EntityId(3)));
        assert_eq!(Command::parse("Delete 12"), Command::Delete(EntityId(12)));
        assert_eq!(Command::parse("edit"), Command::Invalid("usage: edit <id>"));
        assert_eq!(
            Command::parse("view of the bay"),
            Command::Search("view of the bay".to_string())
        );
    }

    #[test]
    fn attr_splits_on_first_equals() {
        assert_eq!(
            Command::parse("attr url = a=b"),
            Command::Attr {
                key: "url".to_string(),
                value: "a=b".to_string(),
            }
        );
        assert_eq!(
            Command::parse("attr nothing"),
            Command::Invalid("usage: attr <key>=<value>")
        );
    }

    #[test]
    fn free_text_is_a_search() {
        assert_eq!(Command::parse("  "), Command::Empty);
        assert_eq!(Command::parse("add"), Command::Add);
        assert_eq!(
            Command::parse("alice smith"),
            Command::Search("alice smith".to_string())
        );
    }
}
