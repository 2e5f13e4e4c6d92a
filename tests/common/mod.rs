//! Hand-rolled `Reflect` fixtures used across the integration tests.

#![allow(dead_code)]

use ordwire::error::DecodeError;
use ordwire::model::{EnumDef, FieldDef, RecordDef, Scalar, TypeDef, UnionDef, UserRef};
use ordwire::{Reflect, TypeExpr, Value};

fn field_error(expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::ValueMismatch {
        expected,
        found: found.kind_name(),
    }
}

// --- Person ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: i32,
}

fn person_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "fixtures.Person",
        fields: vec![
            FieldDef {
                name: "name",
                ty: TypeExpr::scalar(Scalar::Str),
            },
            FieldDef {
                name: "age",
                ty: TypeExpr::scalar(Scalar::I32),
            },
        ],
        fallback_arities: Vec::new(),
    })
}

pub const PERSON: UserRef = UserRef {
    name: "fixtures.Person",
    def: person_def,
};

impl Reflect for Person {
    fn ty() -> TypeExpr {
        TypeExpr::user(PERSON)
    }

    fn to_value(&self) -> Value {
        Value::Record {
            name: "fixtures.Person",
            fields: vec![Value::Str(self.name.clone()), Value::I32(self.age)],
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Record {
                name: "fixtures.Person",
                fields,
            } => {
                let mut fields = fields.into_iter();
                let name = match fields.next() {
                    Some(Value::Str(s)) => s,
                    other => return Err(field_error("str", &other.unwrap_or(Value::Null))),
                };
                let age = match fields.next() {
                    Some(Value::I32(n)) => n,
                    other => return Err(field_error("i32", &other.unwrap_or(Value::Null))),
                };
                Ok(Person { name, age })
            }
            other => Err(field_error("fixtures.Person", &other)),
        }
    }
}

// --- Shape union ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { r: f64 },
    Square { side: f64 },
}

fn circle_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "shapes.Circle",
        fields: vec![FieldDef {
            name: "r",
            ty: TypeExpr::scalar(Scalar::F64),
        }],
        fallback_arities: Vec::new(),
    })
}

fn square_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "shapes.Square",
        fields: vec![FieldDef {
            name: "side",
            ty: TypeExpr::scalar(Scalar::F64),
        }],
        fallback_arities: Vec::new(),
    })
}

pub const CIRCLE: UserRef = UserRef {
    name: "shapes.Circle",
    def: circle_def,
};

pub const SQUARE: UserRef = UserRef {
    name: "shapes.Square",
    def: square_def,
};

fn shape_def() -> TypeDef {
    TypeDef::Union(UnionDef {
        name: "shapes.Shape",
        variants: vec![CIRCLE, SQUARE],
    })
}

pub const SHAPE: UserRef = UserRef {
    name: "shapes.Shape",
    def: shape_def,
};

fn single_f64(fields: Vec<Value>) -> Result<f64, DecodeError> {
    match fields.into_iter().next() {
        Some(Value::F64(x)) => Ok(x),
        other => Err(field_error("f64", &other.unwrap_or(Value::Null))),
    }
}

impl Reflect for Shape {
    fn ty() -> TypeExpr {
        TypeExpr::user(SHAPE)
    }

    fn to_value(&self) -> Value {
        match self {
            Shape::Circle { r } => Value::Record {
                name: "shapes.Circle",
                fields: vec![Value::F64(*r)],
            },
            Shape::Square { side } => Value::Record {
                name: "shapes.Square",
                fields: vec![Value::F64(*side)],
            },
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Record {
                name: "shapes.Circle",
                fields,
            } => Ok(Shape::Circle {
                r: single_f64(fields)?,
            }),
            Value::Record {
                name: "shapes.Square",
                fields,
            } => Ok(Shape::Square {
                side: single_f64(fields)?,
            }),
            other => Err(field_error("shapes.Shape", &other)),
        }
    }
}

// --- Color enum -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Red,
    Green,
    Blue,
}

fn color_def() -> TypeDef {
    TypeDef::Enum(EnumDef {
        name: "paint.Color",
        constants: vec!["Red", "Green", "Blue"],
    })
}

pub const COLOR: UserRef = UserRef {
    name: "paint.Color",
    def: color_def,
};

impl Reflect for Color {
    fn ty() -> TypeExpr {
        TypeExpr::user(COLOR)
    }

    fn to_value(&self) -> Value {
        Value::Enum {
            name: "paint.Color",
            index: *self as u32,
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Enum {
                name: "paint.Color",
                index: 0,
            } => Ok(Color::Red),
            Value::Enum {
                name: "paint.Color",
                index: 1,
            } => Ok(Color::Green),
            Value::Enum {
                name: "paint.Color",
                index: 2,
            } => Ok(Color::Blue),
            other => Err(field_error("paint.Color", &other)),
        }
    }
}

// --- Fruit basket (ordinal stability) -------------------------------------

fn apple_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "fruit.Apple",
        fields: vec![FieldDef {
            name: "variety",
            ty: TypeExpr::scalar(Scalar::Str),
        }],
        fallback_arities: Vec::new(),
    })
}

fn banana_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "fruit.Banana",
        fields: vec![FieldDef {
            name: "ripeness",
            ty: TypeExpr::scalar(Scalar::I8),
        }],
        fallback_arities: Vec::new(),
    })
}

fn cherry_def() -> TypeDef {
    TypeDef::Enum(EnumDef {
        name: "fruit.Cherry",
        constants: vec!["Sweet", "Sour"],
    })
}

/// Fields deliberately declared in non-alphabetical order: the assigned
/// ordinals must come out alphabetical anyway.
fn basket_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "fruit.Basket",
        fields: vec![
            FieldDef {
                name: "cherry",
                ty: TypeExpr::user(UserRef {
                    name: "fruit.Cherry",
                    def: cherry_def,
                }),
            },
            FieldDef {
                name: "banana",
                ty: TypeExpr::user(UserRef {
                    name: "fruit.Banana",
                    def: banana_def,
                }),
            },
            FieldDef {
                name: "apple",
                ty: TypeExpr::user(UserRef {
                    name: "fruit.Apple",
                    def: apple_def,
                }),
            },
        ],
        fallback_arities: Vec::new(),
    })
}

pub const BASKET: UserRef = UserRef {
    name: "fruit.Basket",
    def: basket_def,
};

// --- Schema evolution -----------------------------------------------------

/// Old writer-side schema: one field.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonV1 {
    pub name: String,
}

fn person_v1_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "evo.Person",
        fields: vec![FieldDef {
            name: "name",
            ty: TypeExpr::scalar(Scalar::Str),
        }],
        fallback_arities: Vec::new(),
    })
}

impl Reflect for PersonV1 {
    fn ty() -> TypeExpr {
        TypeExpr::user(UserRef {
            name: "evo.Person",
            def: person_v1_def,
        })
    }

    fn to_value(&self) -> Value {
        Value::Record {
            name: "evo.Person",
            fields: vec![Value::Str(self.name.clone())],
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Record {
                name: "evo.Person",
                fields,
            } => match fields.into_iter().next() {
                Some(Value::Str(name)) => Ok(PersonV1 { name }),
                other => Err(field_error("str", &other.unwrap_or(Value::Null))),
            },
            other => Err(field_error("evo.Person", &other)),
        }
    }
}

/// Newer reader-side schema: an appended `age` field plus a fallback arity
/// accepting the one-field streams of the old schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonV2 {
    pub name: String,
    pub age: i32,
}

fn person_v2_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "evo.Person",
        fields: vec![
            FieldDef {
                name: "name",
                ty: TypeExpr::scalar(Scalar::Str),
            },
            FieldDef {
                name: "age",
                ty: TypeExpr::scalar(Scalar::I32),
            },
        ],
        fallback_arities: vec![1],
    })
}

impl Reflect for PersonV2 {
    fn ty() -> TypeExpr {
        TypeExpr::user(UserRef {
            name: "evo.Person",
            def: person_v2_def,
        })
    }

    fn to_value(&self) -> Value {
        Value::Record {
            name: "evo.Person",
            fields: vec![Value::Str(self.name.clone()), Value::I32(self.age)],
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Record {
                name: "evo.Person",
                fields,
            } => {
                let mut fields = fields.into_iter();
                let name = match fields.next() {
                    Some(Value::Str(s)) => s,
                    other => return Err(field_error("str", &other.unwrap_or(Value::Null))),
                };
                let age = match fields.next() {
                    Some(Value::I32(n)) => n,
                    other => return Err(field_error("i32", &other.unwrap_or(Value::Null))),
                };
                Ok(PersonV2 { name, age })
            }
            other => Err(field_error("evo.Person", &other)),
        }
    }
}

// --- Recursive tree union -------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Leaf(i64),
    Node(Vec<Tree>),
}

fn leaf_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "tree.Leaf",
        fields: vec![FieldDef {
            name: "value",
            ty: TypeExpr::scalar(Scalar::I64),
        }],
        fallback_arities: Vec::new(),
    })
}

fn node_def() -> TypeDef {
    TypeDef::Record(RecordDef {
        name: "tree.Node",
        fields: vec![FieldDef {
            name: "children",
            ty: TypeExpr::list(TypeExpr::user(TREE)),
        }],
        fallback_arities: Vec::new(),
    })
}

fn tree_def() -> TypeDef {
    TypeDef::Union(UnionDef {
        name: "tree.Tree",
        variants: vec![
            UserRef {
                name: "tree.Leaf",
                def: leaf_def,
            },
            UserRef {
                name: "tree.Node",
                def: node_def,
            },
        ],
    })
}

pub const TREE: UserRef = UserRef {
    name: "tree.Tree",
    def: tree_def,
};

impl Reflect for Tree {
    fn ty() -> TypeExpr {
        TypeExpr::user(TREE)
    }

    fn to_value(&self) -> Value {
        match self {
            Tree::Leaf(value) => Value::Record {
                name: "tree.Leaf",
                fields: vec![Value::I64(*value)],
            },
            Tree::Node(children) => Value::Record {
                name: "tree.Node",
                fields: vec![Value::List(
                    children.iter().map(Reflect::to_value).collect(),
                )],
            },
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Record {
                name: "tree.Leaf",
                fields,
            } => match fields.into_iter().next() {
                Some(Value::I64(v)) => Ok(Tree::Leaf(v)),
                other => Err(field_error("i64", &other.unwrap_or(Value::Null))),
            },
            Value::Record {
                name: "tree.Node",
                fields,
            } => match fields.into_iter().next() {
                Some(Value::List(items)) => {
                    items.into_iter().map(Tree::from_value).collect::<Result<_, _>>().map(Tree::Node)
                }
                other => Err(field_error("list", &other.unwrap_or(Value::Null))),
            },
            other => Err(field_error("tree.Tree", &other)),
        }
    }
}
