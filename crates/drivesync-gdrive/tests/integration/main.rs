//! Integration tests for drivesync-gdrive
//!
//! Uses wiremock to simulate the Google Drive v3 API and verifies
//! end-to-end behavior of the DriveClient and the RemoteStore adapter.


mod test_errors;
mod test_files;
