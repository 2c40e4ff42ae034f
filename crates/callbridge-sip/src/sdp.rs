//! SDP offer/answer building and parsing (§4.7).
//!
//! The payload-type list always includes `telephone-event` (PT 101)
//! even when no DTMF is expected — several common SIP peers refuse
//! media entirely without it. A re-INVITE answer, once a codec has been
//! negotiated, advertises only that codec plus telephone-event.

use std::net::IpAddr;

use callbridge_proto::AudioFormat;
use derive_more::Display;

pub const TELEPHONE_EVENT_PAYLOAD_TYPE: u8 = 101;

/// One RTP audio codec this bridge can negotiate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RtpCodec {
    pub payload_type: u8,
    pub encoding_name: &'static str,
    pub clock_rate: u32,
    pub format: AudioFormat,
}

pub const PCMU: RtpCodec = RtpCodec {
    payload_type: 0,
    encoding_name: "PCMU",
    clock_rate: 8000,
    format: AudioFormat::Mulaw8,
};

/// Codecs offered, in preference order. `PCMU` is both the first
/// preference and the negotiation default.
pub const SUPPORTED_CODECS: &[RtpCodec] = &[PCMU];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    fn as_attribute(self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum SdpError {
    #[display(fmt = "no c= connection line")]
    MissingConnectionLine,
    #[display(fmt = "no m=audio media line")]
    MissingAudioMediaLine,
    #[display(fmt = "malformed connection address: {}", _0)]
    MalformedAddress(String),
    #[display(fmt = "malformed m=audio line: {}", _0)]
    MalformedMediaLine(String),
}

impl std::error::Error for SdpError {}

/// The result of parsing a remote SDP offer or answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedSdp {
    pub connection_ip: IpAddr,
    pub audio_port: u16,
    pub payload_types: Vec<u8>,
    pub direction: Direction,
}

impl ParsedSdp {
    /// The first non-telephone-event payload type, if any.
    #[must_use]
    pub fn preferred_codec(&self) -> Option<u8> {
        self.payload_types
            .iter()
            .copied()
            .find(|&pt| pt != TELEPHONE_EVENT_PAYLOAD_TYPE)
    }

    /// Whether this SDP places the call on hold (no media expected from
    /// the far end): a hold direction, or the classic `0.0.0.0`
    /// connection address some peers use instead.
    #[must_use]
    pub fn is_hold(&self) -> bool {
        matches!(self.direction, Direction::SendOnly | Direction::Inactive)
            || self.connection_ip == IpAddr::from([0, 0, 0, 0])
    }
}

fn render_media_line(rtp_port: u16, codecs: &[RtpCodec]) -> String {
    let pts: Vec<String> = codecs
        .iter()
        .map(|c| c.payload_type.to_string())
        .chain(std::iter::once(TELEPHONE_EVENT_PAYLOAD_TYPE.to_string()))
        .collect();
    format!("m=audio {rtp_port} RTP/AVP {}", pts.join(" "))
}

fn render_body(local_ip: IpAddr, rtp_port: u16, ptime_ms: u32, codecs: &[RtpCodec], direction: Direction) -> String {
    let mut lines = vec![
        "v=0".to_string(),
        format!("o=callbridge 0 0 IN IP4 {local_ip}"),
        "s=callbridge".to_string(),
        format!("c=IN IP4 {local_ip}"),
        "t=0 0".to_string(),
        render_media_line(rtp_port, codecs),
    ];
    for codec in codecs {
        lines.push(format!(
            "a=rtpmap:{} {}/{}",
            codec.payload_type, codec.encoding_name, codec.clock_rate
        ));
    }
    lines.push(format!(
        "a=rtpmap:{TELEPHONE_EVENT_PAYLOAD_TYPE} telephone-event/8000"
    ));
    lines.push(format!("a=fmtp:{TELEPHONE_EVENT_PAYLOAD_TYPE} 0-16"));
    lines.push(format!("a=ptime:{ptime_ms}"));
    lines.push(direction.as_attribute().to_string());
    lines.join("\r\n") + "\r\n"
}

/// Builds an initial INVITE-leg offer advertising every supported codec.
#[must_use]
pub fn build_offer(local_ip: IpAddr, rtp_port: u16, ptime_ms: u32) -> String {
    render_body(local_ip, rtp_port, ptime_ms, SUPPORTED_CODECS, Direction::SendRecv)
}

/// Builds a re-INVITE answer advertising only the negotiated codec.
#[must_use]
pub fn build_answer(local_ip: IpAddr, rtp_port: u16, ptime_ms: u32, selected: RtpCodec) -> String {
    render_body(local_ip, rtp_port, ptime_ms, &[selected], Direction::SendRecv)
}

/// Parses connection IP, audio port, payload types, and direction out of
/// a remote SDP body. Direction defaults to `sendrecv` when no
/// direction attribute is present.
pub fn parse(sdp: &str) -> Result<ParsedSdp, SdpError> {
    let mut connection_ip = None;
    let mut media = None;
    let mut direction = Direction::SendRecv;

    for line in sdp.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("c=IN IP4 ") {
            connection_ip = Some(
                rest.trim()
                    .parse::<IpAddr>()
                    .map_err(|_| SdpError::MalformedAddress(rest.to_string()))?,
            );
        } else if let Some(rest) = line.strip_prefix("m=audio ") {
            let mut parts = rest.split_whitespace();
            let port = parts
                .next()
                .ok_or_else(|| SdpError::MalformedMediaLine(rest.to_string()))?
                .parse::<u16>()
                .map_err(|_| SdpError::MalformedMediaLine(rest.to_string()))?;
            // Skip the "RTP/AVP" token.
            let _ = parts.next();
            let payload_types: Vec<u8> = parts.filter_map(|p| p.parse().ok()).collect();
            media = Some((port, payload_types));
        } else {
            direction = match line {
                "a=sendrecv" => Direction::SendRecv,
                "a=sendonly" => Direction::SendOnly,
                "a=recvonly" => Direction::RecvOnly,
                "a=inactive" => Direction::Inactive,
                _ => direction,
            };
        }
    }

    let connection_ip = connection_ip.ok_or(SdpError::MissingConnectionLine)?;
    let (audio_port, payload_types) = media.ok_or(SdpError::MissingAudioMediaLine)?;

    Ok(ParsedSdp {
        connection_ip,
        audio_port,
        payload_types,
        direction,
    })
}

/// Walks supported codecs in preference order and returns the first
/// match against the remote's payload types, defaulting to PCMU.
#[must_use]
pub fn negotiate_codec(remote_payload_types: &[u8]) -> RtpCodec {
    SUPPORTED_CODECS
        .iter()
        .find(|c| remote_payload_types.contains(&c.payload_type))
        .copied()
        .unwrap_or(PCMU)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_always_includes_telephone_event() {
        let sdp = build_offer("127.0.0.1".parse().unwrap(), 30000, 20);
        assert!(sdp.contains("m=audio 30000 RTP/AVP 0 101"));
        assert!(sdp.contains("a=rtpmap:101 telephone-event/8000"));
        assert!(sdp.contains("a=fmtp:101 0-16"));
    }

    #[test]
    fn answer_advertises_only_selected_codec_and_telephone_event() {
        let sdp = build_answer("127.0.0.1".parse().unwrap(), 30000, 20, PCMU);
        assert!(sdp.contains("m=audio 30000 RTP/AVP 0 101"));
        assert_eq!(sdp.matches("a=rtpmap:").count(), 2);
    }

    #[test]
    fn parses_connection_port_and_payload_types() {
        let sdp = "v=0\r\no=- 0 0 IN IP4 10.0.0.5\r\ns=-\r\nc=IN IP4 10.0.0.5\r\nt=0 0\r\nm=audio 40000 RTP/AVP 0 101\r\na=sendonly\r\n";
        let parsed = parse(sdp).unwrap();
        assert_eq!(parsed.connection_ip, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(parsed.audio_port, 40000);
        assert_eq!(parsed.payload_types, vec![0, 101]);
        assert!(parsed.is_hold());
    }

    #[test]
    fn default_direction_is_sendrecv() {
        let sdp = "v=0\r\nc=IN IP4 10.0.0.5\r\nt=0 0\r\nm=audio 40000 RTP/AVP 0 101\r\n";
        let parsed = parse(sdp).unwrap();
        assert!(!parsed.is_hold());
    }

    #[test]
    fn preferred_codec_skips_telephone_event() {
        let sdp = "v=0\r\nc=IN IP4 10.0.0.5\r\nt=0 0\r\nm=audio 40000 RTP/AVP 101 8\r\n";
        let parsed = parse(sdp).unwrap();
        assert_eq!(parsed.preferred_codec(), Some(8));
    }

    #[test]
    fn negotiate_codec_defaults_to_pcmu_on_no_match() {
        let codec = negotiate_codec(&[18, 9]);
        assert_eq!(codec.payload_type, PCMU.payload_type);
    }
}
