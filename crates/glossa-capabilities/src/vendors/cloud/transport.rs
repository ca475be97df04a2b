use glossa_core::CapabilityError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub data: String,
}

/// Incremental server-sent events decoder. Frames may be split across any
/// number of network chunks.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame = parse_sse_frame(&self.buf[..idx]);
            self.buf.drain(..idx + delim_len);
            frames.extend(frame);
        }
        frames
    }

    /// Decodes whatever is left once the body ends. Some servers omit the
    /// blank line after the final frame.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_frame(&rest)
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        if buf[i..].starts_with(b"\n\n") {
            Some((i, 2))
        } else if buf[i..].starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let mut data_lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        // Chat completions only use `data:`; event names, ids and comments are skipped.
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        data: data_lines.join("\n"),
    })
}

/// What one chat completions frame means for the text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChatEvent {
    Delta(String),
    Done,
    Ignored,
}

pub(crate) fn map_chat_frame(frame: &SseFrame) -> Result<ChatEvent, CapabilityError> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(ChatEvent::Ignored);
    }
    if data == "[DONE]" {
        return Ok(ChatEvent::Done);
    }
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| CapabilityError::protocol(format!("invalid SSE JSON frame: {e}")))?;
    map_chat_json(&value)
}

pub(crate) fn map_chat_json(value: &serde_json::Value) -> Result<ChatEvent, CapabilityError> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| error.as_str())
            .unwrap_or("chat completions stream error");
        let status_code = error
            .get("code")
            .and_then(|v| v.as_u64())
            .and_then(|code| u16::try_from(code).ok());
        return Err(CapabilityError::backend(message, status_code));
    }
    let delta = value
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|v| v.as_str());
    Ok(match delta {
        Some(text) => ChatEvent::Delta(text.to_string()),
        None => ChatEvent::Ignored,
    })
}
