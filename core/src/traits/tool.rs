use crate::sandbox::Value;
use crate::tools::ToolArgs;
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    Entry,
    List(Box<TypeTag>),
    Tuple(Vec<TypeTag>),
    Dict(Box<TypeTag>, Box<TypeTag>),
}

impl TypeTag {
    pub fn list_of(inner: TypeTag) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn dict_of(key: TypeTag, value: TypeTag) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::None => f.write_str("None"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Entry => f.write_str("ChatEntry"),
            Self::List(inner) if **inner == Self::Any => f.write_str("list"),
            Self::List(inner) => write!(f, "List[{inner}]"),
            Self::Tuple(items) => {
                f.write_str("Tuple[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Dict(key, value) => write!(f, "Dict[{key}, {value}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeTag,
    pub required: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
    pub returns: TypeTag,
}

impl ToolSpec {
    pub fn to_json(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), json!(p.ty.to_string())))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "properties": properties,
                "required": required,
            },
            "returns": self.returns.to_string(),
        })
    }
}

/// A callable exposed to model-emitted code.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<Parameter>;

    fn returns(&self) -> TypeTag {
        TypeTag::Any
    }

    fn call(&self, args: ToolArgs) -> anyhow::Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
            returns: self.returns(),
        }
    }
}
