// HTTP status codes used by the dispatch core

/// HTTP status codes as defined in RFC 7231 and friends, trimmed to the
/// set the dispatch core actually produces or inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    // 2xx Success
    Ok = 200,
    Created = 201,
    NoContent = 204,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,

    // 4xx Client Errors
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    Conflict = 409,
    Gone = 410,
    UnsupportedMediaType = 415,
    UnprocessableEntity = 422,

    // 5xx Server Errors
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl HttpStatus {
    /// Get the numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the reason phrase for the status code
    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::Created => "Created",
            HttpStatus::NoContent => "No Content",
            HttpStatus::MovedPermanently => "Moved Permanently",
            HttpStatus::Found => "Found",
            HttpStatus::SeeOther => "See Other",
            HttpStatus::NotModified => "Not Modified",
            HttpStatus::TemporaryRedirect => "Temporary Redirect",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::Unauthorized => "Unauthorized",
            HttpStatus::Forbidden => "Forbidden",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::NotAcceptable => "Not Acceptable",
            HttpStatus::Conflict => "Conflict",
            HttpStatus::Gone => "Gone",
            HttpStatus::UnsupportedMediaType => "Unsupported Media Type",
            HttpStatus::UnprocessableEntity => "Unprocessable Entity",
            HttpStatus::InternalServerError => "Internal Server Error",
            HttpStatus::NotImplemented => "Not Implemented",
            HttpStatus::BadGateway => "Bad Gateway",
            HttpStatus::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Look up a status by numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            200 => HttpStatus::Ok,
            201 => HttpStatus::Created,
            204 => HttpStatus::NoContent,
            301 => HttpStatus::MovedPermanently,
            302 => HttpStatus::Found,
            303 => HttpStatus::SeeOther,
            304 => HttpStatus::NotModified,
            307 => HttpStatus::TemporaryRedirect,
            400 => HttpStatus::BadRequest,
            401 => HttpStatus::Unauthorized,
            403 => HttpStatus::Forbidden,
            404 => HttpStatus::NotFound,
            405 => HttpStatus::MethodNotAllowed,
            406 => HttpStatus::NotAcceptable,
            409 => HttpStatus::Conflict,
            410 => HttpStatus::Gone,
            415 => HttpStatus::UnsupportedMediaType,
            422 => HttpStatus::UnprocessableEntity,
            500 => HttpStatus::InternalServerError,
            501 => HttpStatus::NotImplemented,
            502 => HttpStatus::BadGateway,
            503 => HttpStatus::ServiceUnavailable,
            _ => return None,
        };
        Some(status)
    }

    /// Check if this is a redirect status (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.code())
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code())
    }
}

/// Reason phrase for an arbitrary numeric code, falling back to a generic
/// phrase for codes outside the known set.
pub fn reason_for(code: u16) -> &'static str {
    match HttpStatus::from_code(code) {
        Some(status) => status.reason(),
        None if (400..500).contains(&code) => "Client Error",
        None if (500..600).contains(&code) => "Server Error",
        None => "Unknown",
    }
}

/// Default response status for a request method when the resource
/// declares none: the conventional REST status per verb.
pub fn default_status(method: &str) -> u16 {
    match method {
        "GET" => 200,
        "POST" => 303,
        "PUT" => 204,
        "DELETE" => 204,
        "HEAD" => 204,
        "OPTIONS" => 200,
        _ => 200,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        assert_eq!(HttpStatus::from_code(404), Some(HttpStatus::NotFound));
        assert_eq!(HttpStatus::NotFound.code(), 404);
        assert_eq!(HttpStatus::from_code(299), None);
    }

    #[test]
    fn test_classification() {
        assert!(HttpStatus::SeeOther.is_redirect());
        assert!(HttpStatus::BadRequest.is_client_error());
        assert!(HttpStatus::BadGateway.is_server_error());
        assert!(!HttpStatus::Ok.is_client_error());
    }

    #[test]
    fn test_default_status_per_method() {
        assert_eq!(default_status("GET"), 200);
        assert_eq!(default_status("POST"), 303);
        assert_eq!(default_status("DELETE"), 204);
        assert_eq!(default_status("BREW"), 200);
    }
}
