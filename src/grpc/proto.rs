//! `echoserver.proto`: messages and file descriptor.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MessageOptions, MethodDescriptorProto, ServiceDescriptorProto,
};
use std::collections::HashMap;

pub const PACKAGE: &str = "echoserver";
pub const SERVICE_NAME: &str = "echoserver.Echoserver";
pub const FILE_NAME: &str = "echoserver.proto";

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusRequest {
    #[prost(string, tag = "1")]
    pub status: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestRequest {
    /// Target address, `host:port` or a full `http://` URI.
    #[prost(string, tag = "1")]
    pub uri: String,
    /// `package.Service/Method` or `package.Service.Method`.
    #[prost(string, tag = "2")]
    pub method: String,
    /// Request message as JSON.
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(map = "string, string", tag = "4")]
    pub headers: HashMap<String, String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestResponse {
    /// Response message as JSON.
    #[prost(string, tag = "1")]
    pub message: String,
}

fn field(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(kind as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".{PACKAGE}.{input}")),
        output_type: Some(format!(".{PACKAGE}.{output}")),
        ..Default::default()
    }
}

fn request_request() -> DescriptorProto {
    let headers_entry = DescriptorProto {
        name: Some("HeadersEntry".to_string()),
        field: vec![field("key", 1, Type::String), field("value", 2, Type::String)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let headers = FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        type_name: Some(format!(".{PACKAGE}.RequestRequest.HeadersEntry")),
        ..field("headers", 4, Type::Message)
    };

    DescriptorProto {
        nested_type: vec![headers_entry],
        ..message(
            "RequestRequest",
            vec![
                field("uri", 1, Type::String),
                field("method", 2, Type::String),
                field("message", 3, Type::String),
                headers,
            ],
        )
    }
}

pub fn file_descriptor() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(FILE_NAME.to_string()),
        package: Some(PACKAGE.to_string()),
        message_type: vec![
            message("EchoRequest", vec![field("message", 1, Type::String)]),
            message("EchoResponse", vec![field("message", 1, Type::String)]),
            message("StatusRequest", vec![field("status", 1, Type::String)]),
            message("StatusResponse", Vec::new()),
            request_request(),
            message("RequestResponse", vec![field("message", 1, Type::String)]),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Echoserver".to_string()),
            method: vec![
                method("Echo", "EchoRequest", "EchoResponse"),
                method("Status", "StatusRequest", "StatusResponse"),
                method("Request", "RequestRequest", "RequestResponse"),
            ],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// Descriptor set served by the reflection service.
pub fn file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![file_descriptor()],
    }
}
