//! Conversion between axum WebSocket messages and relay frames.
//!
//! Payloads are never parsed here: text stays text, binary stays binary.

use axum::extract::ws::{CloseFrame, Message};

use crate::core::relay::{ClientEvent, ClientRoute, Frame};

/// Map one item from the client socket stream to a bridge event.
pub fn client_event(message: Result<Message, axum::Error>) -> ClientEvent {
    match message {
        Ok(Message::Text(text)) => ClientEvent::Frame(Frame::Text(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => ClientEvent::Frame(Frame::Binary(data)),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => ClientEvent::Activity,
        Ok(Message::Close(frame)) => ClientEvent::Closed {
            code: frame.map(|f| f.code),
        },
        Err(e) => ClientEvent::Error(e.to_string()),
    }
}

/// Map a writer route to the message sent to the browser.
pub fn outgoing_message(route: ClientRoute) -> Message {
    match route {
        ClientRoute::Frame(Frame::Text(text)) => Message::Text(text.into()),
        ClientRoute::Frame(Frame::Binary(data)) => Message::Binary(data),
        ClientRoute::Close(reason) => Message::Close(Some(CloseFrame {
            code: reason.code,
            reason: reason.reason.into(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CloseReason, close_codes};
    use bytes::Bytes;

    #[test]
    fn test_text_and_binary_pass_through() {
        let event = client_event(Ok(Message::Text(r#"{"type":"session.update"}"#.into())));
        assert_eq!(
            event,
            ClientEvent::Frame(Frame::text(r#"{"type":"session.update"}"#))
        );

        let audio = Bytes::from_static(&[0x01, 0x02, 0x03]);
        assert_eq!(
            client_event(Ok(Message::Binary(audio.clone()))),
            ClientEvent::Frame(Frame::Binary(audio))
        );
    }

    #[test]
    fn test_control_messages() {
        assert_eq!(
            client_event(Ok(Message::Ping(Bytes::new()))),
            ClientEvent::Activity
        );
        assert_eq!(
            client_event(Ok(Message::Close(Some(CloseFrame {
                code: 1001,
                reason: "bye".into(),
            })))),
            ClientEvent::Closed { code: Some(1001) }
        );
        assert_eq!(
            client_event(Ok(Message::Close(None))),
            ClientEvent::Closed { code: None }
        );
    }

    #[test]
    fn test_close_route_carries_code_and_reason() {
        let reason = CloseReason {
            code: close_codes::SESSION_NOT_FOUND,
            reason: "session_not_found".to_string(),
        };
        match outgoing_message(ClientRoute::Close(reason)) {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 4404);
                assert_eq!(frame.reason.as_str(), "session_not_found");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_frame_route() {
        match outgoing_message(ClientRoute::Frame(Frame::text("hi"))) {
            Message::Text(text) => assert_eq!(text.as_str(), "hi"),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
