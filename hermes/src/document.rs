//! Parsed operations and the abstract selection tree caches work with.

use crate::{exchange::OperationType, utils::hash_str, Variables};
use graphql_parser::{
    query::{
        Definition, Directive, FragmentDefinition, OperationDefinition, ParseError, Selection,
        SelectionSet, TypeCondition, Value as AstValue
    },
    Pos
};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc
};
use thiserror::Error;

type Ast<'a> = graphql_parser::query::Document<'a, String>;

const TYPENAME: &str = "__typename";
const CLIENT_DIRECTIVE: &str = "client";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("document contains no operation")]
    NoOperation,
    #[error("document contains several operations, one must be picked by name")]
    AmbiguousOperation,
    #[error("no operation named `{0}` in document")]
    UnknownOperation(String),
    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),
    #[error("fragment `{0}` spreads itself")]
    FragmentCycle(String)
}

/// An argument value as written in the document. Variables are resolved at execution time.
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    Variable(String),
    Literal(Value),
    List(Vec<InputValue>),
    Object(Vec<(String, InputValue)>)
}

impl InputValue {
    /// Substitute variables. Unknown variables resolve to `null`.
    pub fn resolve(&self, variables: &Variables) -> Value {
        match self {
            InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
            InputValue::Literal(value) => value.clone(),
            InputValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(variables))
                    .collect()
            ),
            InputValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.resolve(variables)))
                    .collect()
            )
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub default_value: Option<Value>
}

/// A single selected field.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, InputValue)>,
    /// Set by the `@client` directive. The field only ever lives in the local cache.
    pub client_only: bool
}

impl Field {
    /// The key this field has in a response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn arguments(&self, variables: &Variables) -> Variables {
        let sorted: BTreeMap<&str, Value> = self
            .arguments
            .iter()
            .map(|(name, value)| (name.as_str(), value.resolve(variables)))
            .collect();
        sorted
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// The key this field is stored under on its entity: the field name, followed by its
    /// arguments in sorted order if it has any.
    pub fn storage_key(&self, variables: &Variables) -> String {
        if self.arguments.is_empty() {
            return self.name.clone();
        }
        format!(
            "{}({})",
            self.name,
            Value::Object(self.arguments(variables))
        )
    }
}

/// The abstract selection tree of a document.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSelector {
    /// A leaf field.
    Scalar(Field),
    /// `__typename`. Added to every nested selection set, so it may be absent from data that
    /// wasn't produced by a server.
    Typename,
    /// A field with a sub-selection.
    Object(Field, Vec<FieldSelector>),
    /// An inline fragment or fragment spread with its type condition.
    Fragment(Option<String>, Vec<FieldSelector>)
}

impl FieldSelector {
    fn field(name: &str) -> Field {
        Field {
            name: name.to_string(),
            alias: None,
            arguments: Vec::new(),
            client_only: false
        }
    }

    /// Build a leaf selector without going through the parser.
    pub fn scalar(name: &str) -> Self {
        FieldSelector::Scalar(Self::field(name))
    }

    /// Build an object selector without going through the parser.
    pub fn object(name: &str, selection: Vec<FieldSelector>) -> Self {
        FieldSelector::Object(Self::field(name), selection)
    }
}

#[derive(Debug)]
struct DocumentInner {
    operation_type: OperationType,
    operation_name: Option<String>,
    variables: Vec<VariableDefinition>,
    selection: Vec<FieldSelector>,
    query: String,
    key: u32,
    has_client_fields: bool
}

/// An immutable, parsed GraphQL operation. Cloning is cheap.
///
/// ```
/// use hermes::{Document, exchange::OperationType};
///
/// let document = Document::parse(r#"
///     query GetAllBooks($title: String) {
///         books(title: $title) { id title }
///     }
/// "#).unwrap();
///
/// assert_eq!(document.operation_type(), OperationType::Query);
/// assert_eq!(document.operation_name(), Some("GetAllBooks"));
/// assert!(document.query().contains("__typename"));
/// ```
#[derive(Clone, Debug)]
pub struct Document {
    inner: Arc<DocumentInner>
}

impl Document {
    /// Parse a document containing exactly one operation, plus any fragments it uses.
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        Self::parse_operation(source, None)
    }

    /// Parse a document and pick the operation with the given name. If `operation_name` is
    /// `None` the document must contain exactly one operation.
    pub fn parse_operation(
        source: &str,
        operation_name: Option<&str>
    ) -> Result<Self, DocumentError> {
        let mut ast: Ast<'_> = graphql_parser::parse_query::<String>(source)?;
        for definition in ast.definitions.iter_mut() {
            match definition {
                Definition::Operation(operation) => {
                    add_typename(operation_selection_set_mut(operation), false)
                }
                Definition::Fragment(fragment) => add_typename(&mut fragment.selection_set, false)
            }
        }

        let fragments: HashMap<&str, &FragmentDefinition<'_, String>> = ast
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                _ => None
            })
            .collect();

        let operation = pick_operation(&ast, operation_name)?;
        let (operation_type, name, variable_definitions, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (OperationType::Query, None, None, set),
            OperationDefinition::Query(query) => (
                OperationType::Query,
                query.name.as_ref(),
                Some(&query.variable_definitions),
                &query.selection_set
            ),
            OperationDefinition::Mutation(mutation) => (
                OperationType::Mutation,
                mutation.name.as_ref(),
                Some(&mutation.variable_definitions),
                &mutation.selection_set
            ),
            OperationDefinition::Subscription(subscription) => (
                OperationType::Subscription,
                subscription.name.as_ref(),
                Some(&subscription.variable_definitions),
                &subscription.selection_set
            )
        };

        let variables = variable_definitions
            .map(|definitions| {
                definitions
                    .iter()
                    .map(|definition| VariableDefinition {
                        name: definition.name.clone(),
                        default_value: definition
                            .default_value
                            .as_ref()
                            .map(|value| input_value(value).resolve(&Variables::new()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut visiting = Vec::new();
        let selection = convert_selection_set(selection_set, &fragments, &mut visiting)?;
        let operation_name = name.cloned();

        let has_client_fields = contains_client_fields(&selection);

        let printed = ast.to_string();
        let key = hash_str(&printed);
        let query = if has_client_fields {
            network_query(&ast, operation_name.as_deref()).unwrap_or(printed)
        } else {
            printed
        };

        Ok(Document {
            inner: Arc::new(DocumentInner {
                operation_type,
                operation_name,
                variables,
                selection,
                query,
                key,
                has_client_fields
            })
        })
    }

    pub fn operation_type(&self) -> OperationType {
        self.inner.operation_type
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.inner.operation_name.as_deref()
    }

    pub fn variable_definitions(&self) -> &[VariableDefinition] {
        &self.inner.variables
    }

    pub fn selection(&self) -> &[FieldSelector] {
        &self.inner.selection
    }

    /// The printed document as servers see it: `__typename` is added to nested selections and
    /// `@client` fields are removed. Documents without any remote field keep their `@client`
    /// fields, they never leave the cache anyway.
    pub fn query(&self) -> &str {
        &self.inner.query
    }

    /// A hash of the printed document, `@client` fields included.
    pub fn key(&self) -> u32 {
        self.inner.key
    }

    /// Whether any field at any depth is marked `@client`.
    pub fn has_client_fields(&self) -> bool {
        self.inner.has_client_fields
    }

    /// Fill in declared defaults for variables the caller didn't pass.
    pub fn with_defaults(&self, mut variables: Variables) -> Variables {
        for definition in &self.inner.variables {
            if let Some(ref default) = definition.default_value {
                variables
                    .entry(definition.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        variables
    }

    /// The fields selected on the root type, looking through root level fragments.
    pub fn root_fields(&self) -> Vec<&Field> {
        fn collect<'a>(selection: &'a [FieldSelector], fields: &mut Vec<&'a Field>) {
            for selector in selection {
                match selector {
                    FieldSelector::Scalar(field) | FieldSelector::Object(field, _) => {
                        fields.push(field)
                    }
                    FieldSelector::Fragment(_, selection) => collect(selection, fields),
                    FieldSelector::Typename => {}
                }
            }
        }

        let mut fields = Vec::new();
        collect(&self.inner.selection, &mut fields);
        fields
    }

    /// Whether every root field is marked `@client`.
    pub fn is_client_only(&self) -> bool {
        let fields = self.root_fields();
        !fields.is_empty() && fields.iter().all(|field| field.client_only)
    }
}

fn operation_selection_set_mut<'o, 'a>(
    operation: &'o mut OperationDefinition<'a, String>
) -> &'o mut SelectionSet<'a, String> {
    match operation {
        OperationDefinition::SelectionSet(set) => set,
        OperationDefinition::Query(query) => &mut query.selection_set,
        OperationDefinition::Mutation(mutation) => &mut mutation.selection_set,
        OperationDefinition::Subscription(subscription) => &mut subscription.selection_set
    }
}

fn operation_selection_set<'o, 'a>(
    operation: &'o OperationDefinition<'a, String>
) -> &'o SelectionSet<'a, String> {
    match operation {
        OperationDefinition::SelectionSet(set) => set,
        OperationDefinition::Query(query) => &query.selection_set,
        OperationDefinition::Mutation(mutation) => &mutation.selection_set,
        OperationDefinition::Subscription(subscription) => &subscription.selection_set
    }
}

fn pick_operation<'d, 'a>(
    ast: &'d Ast<'a>,
    operation_name: Option<&str>
) -> Result<&'d OperationDefinition<'a, String>, DocumentError> {
    let mut operations = ast.definitions.iter().filter_map(|definition| match definition {
        Definition::Operation(operation) => Some(operation),
        _ => None
    });

    if let Some(wanted) = operation_name {
        return operations
            .find(|operation| name_of(operation) == Some(wanted))
            .ok_or_else(|| DocumentError::UnknownOperation(wanted.to_string()));
    }

    let first = operations.next().ok_or(DocumentError::NoOperation)?;
    if operations.next().is_some() {
        return Err(DocumentError::AmbiguousOperation);
    }
    Ok(first)
}

fn name_of<'d>(operation: &'d OperationDefinition<'_, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref()
    }
}

fn typename_field<'a>(position: Pos) -> Selection<'a, String> {
    Selection::Field(graphql_parser::query::Field {
        position,
        alias: None,
        name: TYPENAME.to_string(),
        arguments: Vec::new(),
        directives: Vec::new(),
        selection_set: SelectionSet {
            span: (position, position),
            items: Vec::new()
        }
    })
}

fn add_typename(set: &mut SelectionSet<'_, String>, add_here: bool) {
    if add_here {
        let has_typename = set.items.iter().any(|item| match item {
            Selection::Field(field) => field.name == TYPENAME && field.alias.is_none(),
            _ => false
        });
        if !has_typename {
            let position = set.span.0;
            set.items.push(typename_field(position));
        }
    }

    for item in set.items.iter_mut() {
        match item {
            Selection::Field(field) if !field.selection_set.items.is_empty() => {
                add_typename(&mut field.selection_set, true)
            }
            Selection::InlineFragment(fragment) => add_typename(&mut fragment.selection_set, false),
            _ => {}
        }
    }
}

fn is_client_only(directives: &[Directive<'_, String>]) -> bool {
    directives
        .iter()
        .any(|directive| directive.name == CLIENT_DIRECTIVE)
}

fn contains_client_fields(selection: &[FieldSelector]) -> bool {
    selection.iter().any(|selector| match selector {
        FieldSelector::Scalar(field) => field.client_only,
        FieldSelector::Object(field, selection) => {
            field.client_only || contains_client_fields(selection)
        }
        FieldSelector::Fragment(_, selection) => contains_client_fields(selection),
        FieldSelector::Typename => false
    })
}

/// Drop `@client` fields, spreads of fragments in `empty_fragments`, and inline fragments left
/// without any selection. Returns whether `set` is empty afterwards.
fn strip_client_fields(
    set: &mut SelectionSet<'_, String>,
    empty_fragments: &HashSet<String>
) -> bool {
    set.items.retain(|item| match item {
        Selection::Field(field) => !is_client_only(&field.directives),
        Selection::FragmentSpread(spread) => !empty_fragments.contains(&spread.fragment_name),
        Selection::InlineFragment(_) => true
    });
    for item in set.items.iter_mut() {
        match item {
            Selection::Field(field) => {
                strip_client_fields(&mut field.selection_set, empty_fragments);
            }
            Selection::InlineFragment(fragment) => {
                strip_client_fields(&mut fragment.selection_set, empty_fragments);
            }
            Selection::FragmentSpread(_) => {}
        }
    }
    // Nested fields always keep their `__typename`, only fragments can empty out.
    set.items.retain(|item| match item {
        Selection::InlineFragment(fragment) => !fragment.selection_set.items.is_empty(),
        _ => true
    });
    set.items.is_empty()
}

/// Print the document without its `@client` fields. `None` if the picked operation has
/// nothing left to ask a server for.
fn network_query(ast: &Ast<'_>, operation_name: Option<&str>) -> Option<String> {
    let mut ast = ast.clone();
    let mut empty_fragments = HashSet::new();
    // Fragments spread other fragments, so repeat until no more of them empty out.
    loop {
        let mut emptied = Vec::new();
        for definition in ast.definitions.iter_mut() {
            match definition {
                Definition::Operation(operation) => {
                    strip_client_fields(operation_selection_set_mut(operation), &empty_fragments);
                }
                Definition::Fragment(fragment) => {
                    if strip_client_fields(&mut fragment.selection_set, &empty_fragments)
                        && !empty_fragments.contains(&fragment.name)
                    {
                        emptied.push(fragment.name.clone());
                    }
                }
            }
        }
        if emptied.is_empty() {
            break;
        }
        empty_fragments.extend(emptied);
    }

    let operation = pick_operation(&ast, operation_name).ok()?;
    if operation_selection_set(operation).items.is_empty() {
        return None;
    }

    ast.definitions.retain(|definition| match definition {
        Definition::Operation(operation) => !operation_selection_set(operation).items.is_empty(),
        Definition::Fragment(fragment) => !empty_fragments.contains(&fragment.name)
    });

    let mut used = HashSet::new();
    for definition in &ast.definitions {
        match definition {
            Definition::Operation(operation) => {
                collect_variables(operation_selection_set(operation), &mut used)
            }
            Definition::Fragment(fragment) => collect_variables(&fragment.selection_set, &mut used)
        }
    }
    for definition in ast.definitions.iter_mut() {
        let definitions = match definition {
            Definition::Operation(OperationDefinition::Query(query)) => {
                &mut query.variable_definitions
            }
            Definition::Operation(OperationDefinition::Mutation(mutation)) => {
                &mut mutation.variable_definitions
            }
            Definition::Operation(OperationDefinition::Subscription(subscription)) => {
                &mut subscription.variable_definitions
            }
            _ => continue
        };
        definitions.retain(|definition| used.contains(&definition.name));
    }

    Some(ast.to_string())
}

fn collect_variables(set: &SelectionSet<'_, String>, used: &mut HashSet<String>) {
    fn visit(value: &AstValue<'_, String>, used: &mut HashSet<String>) {
        match value {
            AstValue::Variable(name) => {
                used.insert(name.clone());
            }
            AstValue::List(items) => items.iter().for_each(|item| visit(item, used)),
            AstValue::Object(fields) => fields.values().for_each(|field| visit(field, used)),
            _ => {}
        }
    }
    fn visit_directives(directives: &[Directive<'_, String>], used: &mut HashSet<String>) {
        for directive in directives {
            directive
                .arguments
                .iter()
                .for_each(|(_, value)| visit(value, used));
        }
    }

    for item in &set.items {
        match item {
            Selection::Field(field) => {
                field
                    .arguments
                    .iter()
                    .for_each(|(_, value)| visit(value, used));
                visit_directives(&field.directives, used);
                collect_variables(&field.selection_set, used);
            }
            Selection::FragmentSpread(spread) => visit_directives(&spread.directives, used),
            Selection::InlineFragment(fragment) => {
                visit_directives(&fragment.directives, used);
                collect_variables(&fragment.selection_set, used);
            }
        }
    }
}

fn input_value(value: &AstValue<'_, String>) -> InputValue {
    match value {
        AstValue::Variable(name) => InputValue::Variable(name.clone()),
        AstValue::Int(number) => {
            InputValue::Literal(number.as_i64().map(Value::from).unwrap_or(Value::Null))
        }
        AstValue::Float(float) => InputValue::Literal(
            serde_json::Number::from_f64(*float)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        ),
        AstValue::String(string) => InputValue::Literal(Value::String(string.clone())),
        AstValue::Boolean(boolean) => InputValue::Literal(Value::Bool(*boolean)),
        AstValue::Null => InputValue::Literal(Value::Null),
        AstValue::Enum(variant) => InputValue::Literal(Value::String(variant.clone())),
        AstValue::List(items) => InputValue::List(items.iter().map(input_value).collect()),
        AstValue::Object(fields) => InputValue::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), input_value(value)))
                .collect()
        )
    }
}

fn convert_selection_set<'a>(
    set: &SelectionSet<'a, String>,
    fragments: &HashMap<&str, &FragmentDefinition<'a, String>>,
    visiting: &mut Vec<String>
) -> Result<Vec<FieldSelector>, DocumentError> {
    let mut selection = Vec::with_capacity(set.items.len());
    for item in &set.items {
        let selector = match item {
            Selection::Field(field) if field.name == TYPENAME && field.alias.is_none() => {
                FieldSelector::Typename
            }
            Selection::Field(field) => {
                let converted = Field {
                    name: field.name.clone(),
                    alias: field.alias.clone(),
                    arguments: field
                        .arguments
                        .iter()
                        .map(|(name, value)| (name.clone(), input_value(value)))
                        .collect(),
                    client_only: is_client_only(&field.directives)
                };
                if field.selection_set.items.is_empty() {
                    FieldSelector::Scalar(converted)
                } else {
                    let inner = convert_selection_set(&field.selection_set, fragments, visiting)?;
                    FieldSelector::Object(converted, inner)
                }
            }
            Selection::InlineFragment(fragment) => {
                let type_condition = fragment
                    .type_condition
                    .as_ref()
                    .map(|TypeCondition::On(typename)| typename.clone());
                let inner = convert_selection_set(&fragment.selection_set, fragments, visiting)?;
                FieldSelector::Fragment(type_condition, inner)
            }
            Selection::FragmentSpread(spread) => {
                let name = &spread.fragment_name;
                if visiting.contains(name) {
                    return Err(DocumentError::FragmentCycle(name.clone()));
                }
                let fragment = fragments
                    .get(name.as_str())
                    .ok_or_else(|| DocumentError::UnknownFragment(name.clone()))?;
                let TypeCondition::On(ref typename) = fragment.type_condition;

                visiting.push(name.clone());
                let inner = convert_selection_set(&fragment.selection_set, fragments, visiting)?;
                visiting.pop();

                FieldSelector::Fragment(Some(typename.clone()), inner)
            }
        };
        selection.push(selector);
    }
    Ok(selection)
}
