//! Schema metadata served by the discovery endpoints.
//!
//! Only the attributes the handlers actually read or write are listed.

use lazy_static::lazy_static;
use serde::Serialize;

use crate::models::{
    GROUP_ENDPOINT, GROUP_RESOURCE, SCIM_SCHEMA_GROUP, SCIM_SCHEMA_USER, USER_ENDPOINT,
    USER_RESOURCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Boolean,
    DateTime,
    Reference,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    ReadWrite,
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Returned {
    Always,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Uniqueness {
    None,
    Server,
}

#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    pub name: &'static str,
    pub attr_type: AttributeType,
    pub multi_valued: bool,
    pub description: &'static str,
    pub required: bool,
    pub case_exact: bool,
    pub mutability: Mutability,
    pub returned: Returned,
    pub uniqueness: Uniqueness,
    pub canonical_values: Vec<&'static str>,
    pub reference_types: Vec<&'static str>,
    pub sub_attributes: Vec<AttributeDefinition>,
}

impl AttributeDefinition {
    /// A single-valued, optional, read-write string attribute.
    fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            attr_type: AttributeType::String,
            multi_valued: false,
            description,
            required: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            returned: Returned::Default,
            uniqueness: Uniqueness::None,
            canonical_values: vec![],
            reference_types: vec![],
            sub_attributes: vec![],
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }

    fn mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    fn returned(mut self, returned: Returned) -> Self {
        self.returned = returned;
        self
    }

    fn uniqueness(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    fn of_type(mut self, attr_type: AttributeType) -> Self {
        self.attr_type = attr_type;
        self
    }

    fn multi_valued(mut self, sub_attributes: Vec<AttributeDefinition>) -> Self {
        self.attr_type = AttributeType::Complex;
        self.multi_valued = true;
        self.sub_attributes = sub_attributes;
        self
    }

    fn canonical_values(mut self, values: Vec<&'static str>) -> Self {
        self.canonical_values = values;
        self
    }

    fn reference_types(mut self, types: Vec<&'static str>) -> Self {
        self.reference_types = types;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone)]
pub struct ResourceTypeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub endpoint: &'static str,
    pub description: &'static str,
    pub schema: &'static str,
}

fn id_attribute(description: &'static str) -> AttributeDefinition {
    AttributeDefinition::string("id", description)
        .case_exact()
        .mutability(Mutability::ReadOnly)
        .returned(Returned::Always)
        .uniqueness(Uniqueness::Server)
}

fn meta_attribute() -> AttributeDefinition {
    let mut meta = AttributeDefinition::string("meta", "Resource metadata")
        .of_type(AttributeType::Complex)
        .mutability(Mutability::ReadOnly);
    meta.sub_attributes = vec![
        AttributeDefinition::string("resourceType", "Name of the resource type")
            .case_exact()
            .mutability(Mutability::ReadOnly),
        AttributeDefinition::string("created", "When the resource was added")
            .of_type(AttributeType::DateTime)
            .mutability(Mutability::ReadOnly),
        AttributeDefinition::string("location", "URI of the resource")
            .of_type(AttributeType::Reference)
            .reference_types(vec!["uri"])
            .mutability(Mutability::ReadOnly),
    ];
    meta
}

lazy_static! {
    pub static ref USER_SCHEMA: SchemaDefinition = SchemaDefinition {
        id: SCIM_SCHEMA_USER,
        name: USER_RESOURCE,
        description: "User Account",
        attributes: vec![
            id_attribute("Unique identifier for the User"),
            AttributeDefinition::string("externalId", "Identifier assigned by the provisioning client")
                .case_exact(),
            AttributeDefinition::string("userName", "Unique login name of the User")
                .required()
                .uniqueness(Uniqueness::Server),
            AttributeDefinition::string("active", "Whether the User may log in")
                .of_type(AttributeType::Boolean),
            AttributeDefinition::string("emails", "Email addresses for the User").multi_valued(vec![
                AttributeDefinition::string("value", "Email address"),
                AttributeDefinition::string("primary", "Marks the preferred address")
                    .of_type(AttributeType::Boolean),
            ]),
            meta_attribute(),
        ],
    };

    pub static ref GROUP_SCHEMA: SchemaDefinition = SchemaDefinition {
        id: SCIM_SCHEMA_GROUP,
        name: GROUP_RESOURCE,
        description: "Group",
        attributes: vec![
            id_attribute("Unique identifier for the Group"),
            AttributeDefinition::string("externalId", "Identifier assigned by the provisioning client")
                .case_exact(),
            AttributeDefinition::string("displayName", "Human-readable name for the Group")
                .required()
                .mutability(Mutability::Immutable)
                .uniqueness(Uniqueness::Server),
            AttributeDefinition::string("members", "Users belonging to the Group").multi_valued(vec![
                AttributeDefinition::string("value", "Identifier of the member User")
                    .case_exact()
                    .mutability(Mutability::Immutable),
                AttributeDefinition::string("display", "Name of the member")
                    .mutability(Mutability::ReadOnly),
                AttributeDefinition::string("type", "Type of the member")
                    .mutability(Mutability::Immutable)
                    .canonical_values(vec![USER_RESOURCE]),
            ]),
            meta_attribute(),
        ],
    };

    pub static ref RESOURCE_TYPES: Vec<ResourceTypeDefinition> = vec![
        ResourceTypeDefinition {
            id: USER_RESOURCE,
            name: USER_RESOURCE,
            endpoint: USER_ENDPOINT,
            description: "User Account",
            schema: SCIM_SCHEMA_USER,
        },
        ResourceTypeDefinition {
            id: GROUP_RESOURCE,
            name: GROUP_RESOURCE,
            endpoint: GROUP_ENDPOINT,
            description: "Group",
            schema: SCIM_SCHEMA_GROUP,
        },
    ];
}

pub fn get_all_schemas() -> Vec<&'static SchemaDefinition> {
    vec![&*USER_SCHEMA, &*GROUP_SCHEMA]
}

/// Looks a schema up by its URN, ignoring case.
pub fn find_schema(id: &str) -> Option<&'static SchemaDefinition> {
    get_all_schemas()
        .into_iter()
        .find(|schema| schema.id.eq_ignore_ascii_case(id))
}

pub fn find_resource_type(id: &str) -> Option<&'static ResourceTypeDefinition> {
    RESOURCE_TYPES
        .iter()
        .find(|resource_type| resource_type.id.eq_ignore_ascii_case(id))
}
