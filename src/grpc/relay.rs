//! Reflection-driven RPC relay.
//!
//! # Responsibilities
//! - Connect to the target and fetch the method's descriptors through the
//!   target's reflection service
//! - Encode the caller's JSON message, invoke the method, render the
//!   response back to JSON
//!
//! # Design Decisions
//! - Descriptors are fetched per call; nothing is cached between calls
//! - The target's status is returned unchanged; local failures (connect,
//!   resolution, encoding) are `INTERNAL` or `UNAVAILABLE`

use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, MethodDescriptor, SerializeOptions};
use prost_types::FileDescriptorProto;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::str::FromStr;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

use crate::config::RelayConfig;
use crate::relay::client::outbound_headers;

/// `package.Service/Method` or `package.Service.Method` → (service, method).
pub fn split_method(full: &str) -> Result<(&str, &str), Status> {
    let full = full.trim_start_matches('/');
    let split = full.rfind('/').or_else(|| full.rfind('.'));
    match split {
        Some(at) if at > 0 && at + 1 < full.len() => Ok((&full[..at], &full[at + 1..])),
        _ => Err(Status::invalid_argument(format!("invalid method name \"{full}\""))),
    }
}

fn endpoint_uri(uri: &str) -> String {
    if uri.contains("://") {
        uri.to_string()
    } else {
        format!("http://{uri}")
    }
}

async fn connect(uri: &str, config: &RelayConfig) -> Result<Channel, Status> {
    let endpoint = Endpoint::from_shared(endpoint_uri(uri))
        .map_err(|e| Status::invalid_argument(format!("invalid uri \"{uri}\": {e}")))?
        .connect_timeout(config.connect_timeout())
        .timeout(config.timeout());

    endpoint
        .connect()
        .await
        .map_err(|e| Status::unavailable(format!("failed to connect to \"{uri}\": {e}")))
}

/// Ask the target's reflection service for `request`.
async fn reflect(
    client: &mut ServerReflectionClient<Channel>,
    request: MessageRequest,
) -> Result<Vec<FileDescriptorProto>, Status> {
    let outbound = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    };
    let mut inbound = client
        .server_reflection_info(Request::new(tokio_stream::iter(vec![outbound])))
        .await?
        .into_inner();

    let response = inbound
        .message()
        .await?
        .ok_or_else(|| Status::internal("reflection stream closed without a response"))?;

    match response.message_response {
        Some(MessageResponse::FileDescriptorResponse(files)) => files
            .file_descriptor_proto
            .iter()
            .map(|bytes| {
                FileDescriptorProto::decode(&bytes[..])
                    .map_err(|e| Status::internal(format!("invalid file descriptor: {e}")))
            })
            .collect(),
        Some(MessageResponse::ErrorResponse(error)) => Err(Status::internal(format!(
            "reflection error {}: {}",
            error.error_code, error.error_message
        ))),
        _ => Err(Status::internal("unexpected reflection response")),
    }
}

fn collect(
    received: Vec<FileDescriptorProto>,
    files: &mut HashMap<String, FileDescriptorProto>,
    pending: &mut VecDeque<String>,
) {
    for file in received {
        pending.extend(file.dependency.iter().cloned());
        files.insert(file.name().to_string(), file);
    }
}

/// Fetch the file declaring `service` and every file it depends on.
async fn fetch_files(channel: Channel, service: &str) -> Result<Vec<FileDescriptorProto>, Status> {
    let mut client = ServerReflectionClient::new(channel);
    let mut files: HashMap<String, FileDescriptorProto> = HashMap::new();
    let mut pending: VecDeque<String> = VecDeque::new();

    let received = reflect(&mut client, MessageRequest::FileContainingSymbol(service.to_string())).await?;
    collect(received, &mut files, &mut pending);

    let mut requested = HashSet::new();
    while let Some(name) = pending.pop_front() {
        if files.contains_key(&name) || !requested.insert(name.clone()) {
            continue;
        }
        let received = reflect(&mut client, MessageRequest::FileByFilename(name)).await?;
        collect(received, &mut files, &mut pending);
    }

    Ok(files.into_values().collect())
}

/// Add `files` to a pool, each after the files it imports.
fn build_pool(files: Vec<FileDescriptorProto>) -> Result<DescriptorPool, Status> {
    let mut pool = DescriptorPool::new();
    let mut remaining = files;

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|file| {
            file.dependency
                .iter()
                .all(|dependency| pool.get_file_by_name(dependency).is_some())
        });
        if ready.is_empty() {
            let names: Vec<_> = blocked.iter().map(|file| file.name().to_string()).collect();
            return Err(Status::internal(format!(
                "unresolved file dependencies: {}",
                names.join(", ")
            )));
        }
        for file in ready {
            pool.add_file_descriptor_proto(file)
                .map_err(|e| Status::internal(format!("invalid descriptor: {e}")))?;
        }
        remaining = blocked;
    }

    Ok(pool)
}

fn resolve_method(pool: &DescriptorPool, service: &str, method: &str) -> Result<MethodDescriptor, Status> {
    let descriptor = pool
        .get_service_by_name(service)
        .ok_or_else(|| Status::internal(format!("service \"{service}\" not found")))?;
    let found = descriptor
        .methods()
        .find(|candidate| candidate.name() == method)
        .ok_or_else(|| Status::internal(format!("method \"{method}\" not found in \"{service}\"")));
    found
}

fn parse_message(descriptor: MessageDescriptor, json: &str) -> Result<DynamicMessage, Status> {
    let json = if json.trim().is_empty() { "{}" } else { json };
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let message = DynamicMessage::deserialize(descriptor, &mut deserializer)
        .map_err(|e| Status::internal(format!("invalid request message: {e}")))?;
    deserializer
        .end()
        .map_err(|e| Status::internal(format!("invalid request message: {e}")))?;
    Ok(message)
}

fn render_message(message: &DynamicMessage) -> Result<String, Status> {
    let options = SerializeOptions::new().skip_default_fields(false);
    let mut serializer = serde_json::Serializer::pretty(Vec::new());
    message
        .serialize_with_options(&mut serializer, &options)
        .map_err(|e| Status::internal(format!("failed to render response: {e}")))?;

    let mut rendered = String::from_utf8(serializer.into_inner())
        .map_err(|e| Status::internal(format!("failed to render response: {e}")))?;
    rendered.push('\n');
    Ok(rendered)
}

/// Outbound metadata: caller headers, then propagated ones not already set.
pub fn outbound_metadata(
    caller: &HashMap<String, String>,
    propagation: tonic::codegen::http::HeaderMap,
) -> Result<MetadataMap, Status> {
    let caller: BTreeMap<String, String> = caller
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect();
    let headers = outbound_headers(&caller, propagation)
        .map_err(|e| Status::invalid_argument(e.to_string()))?;
    Ok(MetadataMap::from_headers(headers))
}

/// Invoke `method` on the server at `uri` with the JSON `message`.
///
/// Returns the JSON rendering of the response, or the target's status.
pub async fn invoke(
    config: &RelayConfig,
    uri: &str,
    method: &str,
    message: &str,
    metadata: MetadataMap,
) -> Result<String, Status> {
    let (service_name, method_name) = split_method(method)?;
    let channel = connect(uri, config).await?;

    let files = fetch_files(channel.clone(), service_name).await?;
    let pool = build_pool(files)?;
    let method = resolve_method(&pool, service_name, method_name)?;
    let input = parse_message(method.input(), message)?;

    let path = PathAndQuery::from_str(&format!("/{}/{}", method.parent_service().full_name(), method.name()))
        .map_err(|e| Status::internal(format!("invalid method path: {e}")))?;

    let mut request = Request::new(input);
    *request.metadata_mut() = metadata;

    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("target not ready: {e}")))?;
    let response = grpc
        .unary(request, path, DynamicCodec::new(method.output()))
        .await?;

    render_message(&response.into_inner())
}

/// Codec for messages only known at runtime.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    output: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(output: MessageDescriptor) -> Self {
        Self { output }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.output.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode message: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        DynamicMessage::decode(self.0.clone(), src)
            .map(Some)
            .map_err(|e| Status::internal(format!("failed to decode message: {e}")))
    }
}
