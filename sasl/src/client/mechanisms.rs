mod anonymous;
mod digest_md5;
mod external;
mod oauthbearer;
mod plain;
mod scram;
mod xoauth2;

pub use anonymous::Anonymous;
pub use digest_md5::DigestMd5;
pub use external::External;
pub use oauthbearer::OAuthBearer;
pub use plain::Plain;
pub use scram::ScramSha1;
pub use xoauth2::XOAuth2;
