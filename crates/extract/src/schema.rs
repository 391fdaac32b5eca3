use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::LazyLock;

use crate::category::Category;

/// One node of a schema tree.
#[derive(Debug, Clone)]
pub enum Node {
    String,
    /// Inclusive bounds
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    /// Closed set of allowed string values
    Enum(&'static [&'static str]),
    Array(Box<Node>),
    Object(Vec<Field>),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub node: Node,
    pub required: bool,
    pub description: &'static str,
}

/// Validation schema for one category. Immutable once built.
#[derive(Debug)]
pub struct Schema {
    pub category: Category,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type validation failed: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            let path = if issue.path.is_empty() { "(root)" } else { &issue.path };
            write!(f, "{}: {}", path, issue.message)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Strict,
    Partial,
}

fn req(name: &'static str, description: &'static str, node: Node) -> Field {
    Field { name, node, required: true, description }
}

fn opt(name: &'static str, description: &'static str, node: Node) -> Field {
    Field { name, node, required: false, description }
}

fn number() -> Node {
    Node::Number { min: None, max: None }
}

fn strings() -> Node {
    Node::Array(Box::new(Node::String))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Node {
    fn kind(&self) -> &'static str {
        match self {
            Node::String | Node::Enum(_) => "string",
            Node::Number { .. } => "number",
            Node::Boolean => "boolean",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }

    fn check(&self, value: &Value, path: &str, mode: Mode, issues: &mut Vec<ValidationIssue>) {
        match (self, value) {
            (Node::String, Value::String(_)) | (Node::Boolean, Value::Bool(_)) => {}
            (Node::Number { min, max }, Value::Number(n)) => {
                let Some(n) = n.as_f64() else {
                    push_issue(issues, path, "expected finite number".to_string());
                    return;
                };
                if let Some(min) = min.filter(|m| n < *m) {
                    push_issue(issues, path, format!("number must be greater than or equal to {}", min));
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    push_issue(issues, path, format!("number must be less than or equal to {}", max));
                }
            }
            (Node::Enum(allowed), Value::String(s)) => {
                let ok = match mode {
                    Mode::Strict => allowed.contains(&s.as_str()),
                    // The value may still be streaming in
                    Mode::Partial => allowed.iter().any(|a| a.starts_with(s.as_str())),
                };
                if !ok {
                    let message = format!(
                        "invalid enum value '{}', expected one of {}",
                        s,
                        allowed.join(", ")
                    );
                    push_issue(issues, path, message);
                }
            }
            (Node::Array(item), Value::Array(items)) => {
                for (i, v) in items.iter().enumerate() {
                    item.check(v, &format!("{}[{}]", path, i), mode, issues);
                }
            }
            (Node::Object(fields), Value::Object(map)) => {
                check_fields(fields, map, path, mode, issues);
            }
            (node, other) => {
                let message = format!("expected {}, received {}", node.kind(), kind_of(other));
                push_issue(issues, path, message);
            }
        }
    }

    fn to_provider(&self, description: &str) -> Value {
        let mut out = match self {
            Node::String => json!({ "type": "STRING" }),
            Node::Number { min, max } => {
                let mut n = json!({ "type": "NUMBER" });
                if let Some(min) = min {
                    n["minimum"] = json!(min);
                }
                if let Some(max) = max {
                    n["maximum"] = json!(max);
                }
                n
            }
            Node::Boolean => json!({ "type": "BOOLEAN" }),
            Node::Enum(values) => json!({ "type": "STRING", "enum": values }),
            Node::Array(item) => json!({ "type": "ARRAY", "items": item.to_provider("") }),
            Node::Object(fields) => object_to_provider(fields),
        };
        if !description.is_empty() {
            out["description"] = json!(description);
        }
        out
    }
}

fn push_issue(issues: &mut Vec<ValidationIssue>, path: &str, message: String) {
    issues.push(ValidationIssue { path: path.to_string(), message });
}

fn check_fields(
    fields: &[Field],
    map: &Map<String, Value>,
    path: &str,
    mode: Mode,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in fields {
        let field_path = if path.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", path, field.name)
        };
        match map.get(field.name) {
            Some(v) => field.node.check(v, &field_path, mode, issues),
            None if field.required && mode == Mode::Strict => issues.push(ValidationIssue {
                path: field_path,
                message: format!("expected {}, received undefined", field.node.kind()),
            }),
            None => {}
        }
    }
}

fn object_to_provider(fields: &[Field]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), field.node.to_provider(field.description));
    }
    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();
    let ordering: Vec<&str> = fields.iter().map(|f| f.name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
        "propertyOrdering": ordering,
    })
}

impl Schema {
    /// Strict validation of a finished object
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.run(value, Mode::Strict)
    }

    /// Validation of an object that is still streaming in: values already
    /// present must be well-typed, nothing is required yet.
    pub fn validate_partial(&self, value: &Value) -> Result<(), ValidationError> {
        self.run(value, Mode::Partial)
    }

    fn run(&self, value: &Value, mode: Mode) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        match value {
            Value::Object(map) => check_fields(&self.fields, map, "", mode, &mut issues),
            other => issues.push(ValidationIssue {
                path: String::new(),
                message: format!("expected object, received {}", kind_of(other)),
            }),
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Response schema in the provider's OpenAPI-subset dialect
    pub fn to_provider_schema(&self) -> Value {
        object_to_provider(&self.fields)
    }
}

static ROAD_BIKE: LazyLock<Schema> = LazyLock::new(|| Schema {
    category: Category::RoadBike,
    fields: vec![
        req("model", "Bike model name", Node::String),
        req("brand", "Manufacturer brand", Node::String),
        req("year", "Model year", number()),
        req(
            "category",
            "Bike category",
            Node::Enum(&["racing", "endurance", "aero", "gravel", "touring"]),
        ),
        req(
            "frame",
            "Frame specifications",
            Node::Object(vec![
                req(
                    "material",
                    "Frame material",
                    Node::Enum(&["carbon", "aluminum", "steel", "titanium"]),
                ),
                req("weight", "Frame weight (e.g., \"850g\")", Node::String),
                opt("geometry", "Geometry type (e.g., \"aggressive\", \"relaxed\")", Node::String),
            ]),
        ),
        req(
            "groupset",
            "Drivetrain groupset",
            Node::Object(vec![
                req("brand", "Groupset manufacturer (e.g., Shimano, SRAM, Campagnolo)", Node::String),
                req("model", "Groupset model (e.g., \"Dura-Ace Di2\", \"Ultegra\")", Node::String),
                req("speeds", "Number of gears (e.g., 11, 12)", number()),
                req("electronic", "Whether it has electronic shifting", Node::Boolean),
            ]),
        ),
        opt(
            "wheels",
            "Wheel specifications",
            Node::Object(vec![
                opt("brand", "", Node::String),
                opt("rimDepth", "Rim depth (e.g., \"50mm\")", Node::String),
                opt("tubeless", "", Node::Boolean),
            ]),
        ),
        req("price", "Price in USD", number()),
        req("weight", "Total bike weight (e.g., \"7.2kg\")", Node::String),
        req("features", "Key features and technologies", strings()),
        opt(
            "tourDeFranceHistory",
            "Tour de France history if applicable",
            Node::Object(vec![
                req("usedInTDF", "Whether used in Tour de France", Node::Boolean),
                opt("teams", "Teams that used this bike", strings()),
                opt("victories", "Notable TDF victories with this bike", strings()),
            ]),
        ),
    ],
});

static ALBUM: LazyLock<Schema> = LazyLock::new(|| Schema {
    category: Category::Album,
    fields: vec![
        req("title", "Album title", Node::String),
        req("artist", "Artist or band name", Node::String),
        req("releaseYear", "Year of release", number()),
        req("genre", "Music genre (e.g., Rock, Jazz, Classical, Hip-Hop)", Node::String),
        opt("label", "Record label", Node::String),
        req(
            "tracks",
            "List of tracks on the album",
            Node::Array(Box::new(Node::Object(vec![
                req("number", "Track number", number()),
                req("title", "Song title", Node::String),
                req("duration", "Duration (e.g., \"3:45\")", Node::String),
                opt("featuring", "Featured artists if any", strings()),
            ]))),
        ),
        opt("producers", "Album producers", strings()),
        opt("awards", "Notable awards or certifications", strings()),
        opt(
            "rating",
            "Average rating (0-5)",
            Node::Number { min: Some(0.0), max: Some(5.0) },
        ),
    ],
});

static RECIPE: LazyLock<Schema> = LazyLock::new(|| Schema {
    category: Category::Recipe,
    fields: vec![
        req("name", "Name of the dish", Node::String),
        req("cuisine", "Type of cuisine (e.g., Italian, French, Asian)", Node::String),
        req("difficulty", "Cooking difficulty level", Node::Enum(&["easy", "medium", "hard"])),
        req("prepTime", "Preparation time in minutes", number()),
        req("cookTime", "Cooking time in minutes", number()),
        req("servings", "Number of servings", number()),
        req(
            "ingredients",
            "List of ingredients",
            Node::Array(Box::new(Node::Object(vec![
                req("item", "Ingredient name", Node::String),
                req("amount", "Amount needed (e.g., \"2 cups\", \"1 tbsp\")", Node::String),
            ]))),
        ),
        req("instructions", "Step-by-step cooking instructions", strings()),
        opt("tags", "Tags like \"vegetarian\", \"gluten-free\", \"dessert\"", strings()),
        opt(
            "nutritionInfo",
            "Nutritional information per serving",
            Node::Object(vec![
                opt("calories", "", number()),
                opt("protein", "", Node::String),
                opt("carbs", "", Node::String),
            ]),
        ),
    ],
});

/// Registry lookup: one fixed schema per category
pub fn get_schema(category: Category) -> &'static Schema {
    match category {
        Category::RoadBike => &ROAD_BIKE,
        Category::Album => &ALBUM,
        Category::Recipe => &RECIPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> Value {
        json!({
            "name": "Gazpacho",
            "cuisine": "Spanish",
            "difficulty": "easy",
            "prepTime": 15,
            "cookTime": 0,
            "servings": 6,
            "ingredients": [{ "item": "tomatoes", "amount": "1kg" }],
            "instructions": ["Blend", "Chill"]
        })
    }

    fn bike() -> Value {
        json!({
            "model": "Ultimate CF SLX 8",
            "brand": "Canyon",
            "year": 2024,
            "category": "racing",
            "frame": { "material": "carbon", "weight": "780g" },
            "groupset": { "brand": "Shimano", "model": "Ultegra Di2", "speeds": 12, "electronic": true },
            "price": 5500,
            "weight": "7.2kg",
            "features": ["disc brakes"]
        })
    }

    #[test]
    fn test_accepts_complete_objects() {
        assert!(get_schema(Category::Recipe).validate(&recipe()).is_ok());
        assert!(get_schema(Category::RoadBike).validate(&bike()).is_ok());

        let album = json!({
            "title": "Lemonade",
            "artist": "Beyoncé",
            "releaseYear": 2016,
            "genre": "R&B",
            "tracks": [{ "number": 1, "title": "Formation", "duration": "3:26" }],
            "rating": 5
        });
        assert!(get_schema(Category::Album).validate(&album).is_ok());
    }

    #[test]
    fn test_enum_is_closed() {
        let schema = get_schema(Category::Recipe);
        let mut value = recipe();
        value["difficulty"] = json!("impossible");
        let err = schema.validate(&value).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "difficulty");
        assert!(err.to_string().starts_with("Type validation failed"));
    }

    #[test]
    fn test_missing_required_nested_field() {
        let mut value = bike();
        value["frame"].as_object_mut().unwrap().remove("weight");
        let err = get_schema(Category::RoadBike).validate(&value).unwrap_err();
        assert_eq!(err.issues[0].path, "frame.weight");
        assert_eq!(err.issues[0].message, "expected string, received undefined");
    }

    #[test]
    fn test_rating_range() {
        let schema = get_schema(Category::Album);
        let mut album = json!({
            "title": "4", "artist": "Beyoncé", "releaseYear": 2011, "genre": "Pop",
            "tracks": [], "rating": 5.5
        });
        assert!(schema.validate(&album).is_err());
        album["rating"] = json!(-1);
        assert!(schema.validate(&album).is_err());
        album["rating"] = json!(0);
        assert!(schema.validate(&album).is_ok());
    }

    #[test]
    fn test_optional_fields_must_be_typed() {
        let schema = get_schema(Category::Recipe);
        let mut value = recipe();
        value["nutritionInfo"] = json!({ "calories": "lots" });
        let err = schema.validate(&value).unwrap_err();
        assert_eq!(err.issues[0].path, "nutritionInfo.calories");

        value["nutritionInfo"] = json!({ "calories": 180 });
        assert!(schema.validate(&value).is_ok());
    }

    #[test]
    fn test_array_item_paths() {
        let schema = get_schema(Category::Recipe);
        let mut value = recipe();
        value["ingredients"] = json!([{ "item": "salt", "amount": "1 tsp" }, { "item": "oil" }]);
        let err = schema.validate(&value).unwrap_err();
        assert_eq!(err.issues[0].path, "ingredients[1].amount");
    }

    #[test]
    fn test_partial_allows_missing_fields() {
        let schema = get_schema(Category::Recipe);
        assert!(schema.validate_partial(&json!({})).is_ok());
        assert!(schema.validate_partial(&json!({ "name": "Tira", "difficulty": "me" })).is_ok());
        assert!(schema.validate_partial(&json!({ "difficulty": "x" })).is_err());
        assert!(schema.validate_partial(&json!({ "servings": "four" })).is_err());
        assert!(schema.validate(&json!({ "name": "Tira" })).is_err());
    }

    #[test]
    fn test_non_object_root() {
        let err = get_schema(Category::Album).validate(&Value::Null).unwrap_err();
        assert_eq!(err.issues[0].message, "expected object, received null");
    }

    #[test]
    fn test_provider_schema_shape() {
        let schema = get_schema(Category::Album).to_provider_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["tracks"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["tracks"]["items"]["type"], "OBJECT");
        assert_eq!(schema["properties"]["rating"]["maximum"], 5.0);
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("title")));
        assert!(!required.contains(&json!("label")));
    }
}
