//! sea-query `Iden` table/column definitions.

use sea_query::Iden;

#[derive(Iden)]
pub enum Sessions {
    Table,
    Id,
    OwnerUserId,
    ExternalId,
    TranscriptPath,
    Cwd,
    Hostname,
    Username,
    GitInfo,
    Summary,
    FirstUserMessage,
    LastMessageAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum SyncFiles {
    Table,
    SessionId,
    FileName,
    FileType,
    LastSyncedLine,
    ChunkCount,
    LatestMessageTs,
    UpdatedAt,
}

#[derive(Iden)]
pub enum SessionShares {
    Table,
    Id,
    SessionId,
    ShareToken,
    ShareKind,
    RecipientEmail,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum SessionEvents {
    Table,
    Id,
    SessionId,
    EventType,
    EventTimestamp,
    Payload,
}

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    Name,
    Status,
}

#[derive(Iden)]
pub enum ApiKeys {
    Table,
    Id,
    OwnerUserId,
    KeyHash,
    CreatedAt,
    RevokedAt,
}
