//! Conversion of driver errors into store errors.

use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};

use docengine_core::error::StoreError;

/// Keeps the server's own message and code when the driver reports one.
pub(crate) fn store_error(error: MongoError) -> StoreError {
    let (message, code) = match error.kind.as_ref() {
        ErrorKind::Command(command) => (command.message.clone(), Some(command.code)),
        ErrorKind::Write(WriteFailure::WriteError(write)) => (write.message.clone(), Some(write.code)),
        ErrorKind::Write(WriteFailure::WriteConcernError(concern)) => {
            (concern.message.clone(), Some(concern.code))
        }
        _ => (error.to_string(), None),
    };

    let store_error = StoreError::new(message).with_source(error);

    match code {
        Some(code) => store_error.with_code(code),
        None => store_error,
    }
}
