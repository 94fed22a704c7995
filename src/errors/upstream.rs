//! Catalog of upstream-facing failure categories.
//!
//! These failures originate in the data plane and are identified by Envoy
//! response flags. The control plane never produces them; it only renders a
//! consistent status and JSON body for each one into the listener's local
//! reply configuration.

use serde::Serialize;

/// Upstream failure category reported by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamFailure {
    NoRoute,
    UpstreamConnectionFailure,
    UpstreamRequestTimeout,
    UpstreamRemoteReset,
    UpstreamConnectionTermination,
    UpstreamOverflow,
    NoHealthyUpstream,
    UpstreamRetryLimitExceeded,
    NoClusterFound,
    LocalReset,
    InvalidEnvoyRequestHeaders,
    StreamIdleTimeout,
    DownstreamProtocolError,
    UpstreamProtocolError,
    UpstreamMaxStreamDurationReached,
}

/// JSON body returned to the downstream client for a cataloged failure
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureBody {
    pub code: u32,
    pub message: &'static str,
    pub description: &'static str,
}

impl UpstreamFailure {
    pub const ALL: [UpstreamFailure; 15] = [
        UpstreamFailure::NoRoute,
        UpstreamFailure::UpstreamConnectionFailure,
        UpstreamFailure::UpstreamRequestTimeout,
        UpstreamFailure::UpstreamRemoteReset,
        UpstreamFailure::UpstreamConnectionTermination,
        UpstreamFailure::UpstreamOverflow,
        UpstreamFailure::NoHealthyUpstream,
        UpstreamFailure::UpstreamRetryLimitExceeded,
        UpstreamFailure::NoClusterFound,
        UpstreamFailure::LocalReset,
        UpstreamFailure::InvalidEnvoyRequestHeaders,
        UpstreamFailure::StreamIdleTimeout,
        UpstreamFailure::DownstreamProtocolError,
        UpstreamFailure::UpstreamProtocolError,
        UpstreamFailure::UpstreamMaxStreamDurationReached,
    ];

    /// Envoy response flag short code
    pub fn response_flag(self) -> &'static str {
        match self {
            UpstreamFailure::NoRoute => "NR",
            UpstreamFailure::UpstreamConnectionFailure => "UF",
            UpstreamFailure::UpstreamRequestTimeout => "UT",
            UpstreamFailure::UpstreamRemoteReset => "UR",
            UpstreamFailure::UpstreamConnectionTermination => "UC",
            UpstreamFailure::UpstreamOverflow => "UO",
            UpstreamFailure::NoHealthyUpstream => "UH",
            UpstreamFailure::UpstreamRetryLimitExceeded => "URX",
            UpstreamFailure::NoClusterFound => "NC",
            UpstreamFailure::LocalReset => "LR",
            UpstreamFailure::InvalidEnvoyRequestHeaders => "IH",
            UpstreamFailure::StreamIdleTimeout => "SI",
            UpstreamFailure::DownstreamProtocolError => "DPE",
            UpstreamFailure::UpstreamProtocolError => "UPE",
            UpstreamFailure::UpstreamMaxStreamDurationReached => "UMSDR",
        }
    }

    /// HTTP status returned to the downstream client
    pub fn status(self) -> u16 {
        match self {
            UpstreamFailure::NoRoute => 404,
            UpstreamFailure::UpstreamRequestTimeout => 504,
            UpstreamFailure::InvalidEnvoyRequestHeaders => 400,
            UpstreamFailure::UpstreamConnectionFailure
            | UpstreamFailure::UpstreamRemoteReset
            | UpstreamFailure::UpstreamConnectionTermination
            | UpstreamFailure::UpstreamOverflow
            | UpstreamFailure::NoHealthyUpstream
            | UpstreamFailure::LocalReset => 503,
            UpstreamFailure::UpstreamRetryLimitExceeded
            | UpstreamFailure::NoClusterFound
            | UpstreamFailure::StreamIdleTimeout
            | UpstreamFailure::DownstreamProtocolError
            | UpstreamFailure::UpstreamProtocolError
            | UpstreamFailure::UpstreamMaxStreamDurationReached => 500,
        }
    }

    /// Stable numeric error code exposed in the response body
    pub fn code(self) -> u32 {
        match self {
            UpstreamFailure::NoRoute => 102_404,
            UpstreamFailure::UpstreamConnectionFailure => 102_503,
            UpstreamFailure::UpstreamRequestTimeout => 102_504,
            UpstreamFailure::UpstreamRemoteReset => 102_505,
            UpstreamFailure::UpstreamConnectionTermination => 102_506,
            UpstreamFailure::UpstreamOverflow => 102_507,
            UpstreamFailure::NoHealthyUpstream => 102_508,
            UpstreamFailure::UpstreamRetryLimitExceeded => 102_509,
            UpstreamFailure::NoClusterFound => 102_510,
            UpstreamFailure::LocalReset => 102_511,
            UpstreamFailure::InvalidEnvoyRequestHeaders => 102_400,
            UpstreamFailure::StreamIdleTimeout => 102_512,
            UpstreamFailure::DownstreamProtocolError => 102_513,
            UpstreamFailure::UpstreamProtocolError => 102_514,
            UpstreamFailure::UpstreamMaxStreamDurationReached => 102_515,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            UpstreamFailure::NoRoute => "Resource not found",
            UpstreamFailure::UpstreamConnectionFailure => "Upstream connection failed",
            UpstreamFailure::UpstreamRequestTimeout => "Upstream request timeout",
            UpstreamFailure::UpstreamRemoteReset => "Upstream remote reset",
            UpstreamFailure::UpstreamConnectionTermination => "Upstream connection terminated",
            UpstreamFailure::UpstreamOverflow => "Upstream overflow",
            UpstreamFailure::NoHealthyUpstream => "No healthy upstream",
            UpstreamFailure::UpstreamRetryLimitExceeded => "Upstream retry limit exceeded",
            UpstreamFailure::NoClusterFound => "No cluster found",
            UpstreamFailure::LocalReset => "Local reset",
            UpstreamFailure::InvalidEnvoyRequestHeaders => "Invalid request headers",
            UpstreamFailure::StreamIdleTimeout => "Stream idle timeout",
            UpstreamFailure::DownstreamProtocolError => "Downstream protocol error",
            UpstreamFailure::UpstreamProtocolError => "Upstream protocol error",
            UpstreamFailure::UpstreamMaxStreamDurationReached => "Max stream duration reached",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UpstreamFailure::NoRoute => "No matching route was found for the request",
            UpstreamFailure::UpstreamConnectionFailure => {
                "The gateway could not open a connection to the backend"
            }
            UpstreamFailure::UpstreamRequestTimeout => {
                "The backend did not respond within the route timeout"
            }
            UpstreamFailure::UpstreamRemoteReset => "The backend reset the connection",
            UpstreamFailure::UpstreamConnectionTermination => {
                "The backend connection was terminated before a response was received"
            }
            UpstreamFailure::UpstreamOverflow => {
                "The request was rejected by the backend circuit breaker"
            }
            UpstreamFailure::NoHealthyUpstream => "No healthy backend host is available",
            UpstreamFailure::UpstreamRetryLimitExceeded => {
                "The retry budget for the backend was exhausted"
            }
            UpstreamFailure::NoClusterFound => "The target backend cluster is not configured",
            UpstreamFailure::LocalReset => "The gateway reset the connection locally",
            UpstreamFailure::InvalidEnvoyRequestHeaders => {
                "The request carried headers the gateway does not accept"
            }
            UpstreamFailure::StreamIdleTimeout => "The request stream was idle for too long",
            UpstreamFailure::DownstreamProtocolError => {
                "The client sent a request that violates the HTTP protocol"
            }
            UpstreamFailure::UpstreamProtocolError => {
                "The backend sent a response that violates the HTTP protocol"
            }
            UpstreamFailure::UpstreamMaxStreamDurationReached => {
                "The request exceeded the maximum stream duration"
            }
        }
    }

    pub fn body(self) -> FailureBody {
        FailureBody { code: self.code(), message: self.message(), description: self.description() }
    }

    /// Look up a catalog entry by its Envoy response flag
    pub fn from_response_flag(flag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|failure| failure.response_flag() == flag)
    }
}
