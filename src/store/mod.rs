use std::path::Path;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::domains::chat::{
    now_millis, Chat, ChatMessage, ChatWithMessages, GeneratedAudio, GeneratedImage, Memory,
};
use crate::error::{BlitzChatError, Result};

pub mod schema;
use schema::{chat_messages, chats, generated_audios, generated_images, memories};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct ChatRow {
    id: i64,
    title: Option<String>,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Chat {
            id: row.id,
            title: row.title,
        }
    }
}

#[derive(Queryable)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    role: String,
    content: Option<String>,
    generating: bool,
    time: i64,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        ChatMessage {
            id: row.id,
            chat_id: row.chat_id,
            role: row.role,
            content: row.content,
            generating: row.generating,
            time: row.time,
        }
    }
}

#[derive(Queryable)]
struct MemoryRow {
    id: i64,
    content: String,
    chat_id: Option<i64>,
    created_time: i64,
    updated_time: i64,
}

impl From<MemoryRow> for Memory {
    fn from(row: MemoryRow) -> Self {
        Memory {
            id: row.id,
            content: row.content,
            chat_id: row.chat_id,
            created_time: row.created_time,
            updated_time: row.updated_time,
        }
    }
}

#[derive(Queryable)]
struct ImageRow {
    id: i64,
    prompt: Option<String>,
    url: Option<String>,
}

#[derive(Queryable)]
struct AudioRow {
    id: i64,
    input: String,
    file_path: String,
    file_mime_type: String,
}

#[derive(QueryableByName)]
struct RowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    id: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chat_messages)]
struct NewMessage<'a> {
    chat_id: i64,
    role: &'a str,
    content: Option<&'a str>,
    generating: bool,
    time: i64,
}

#[derive(Insertable)]
#[diesel(table_name = memories)]
struct NewMemory<'a> {
    content: &'a str,
    chat_id: Option<i64>,
    created_time: i64,
    updated_time: i64,
}

#[derive(Insertable)]
#[diesel(table_name = generated_images)]
struct NewImage<'a> {
    prompt: Option<&'a str>,
    url: Option<&'a str>,
}

#[derive(Insertable)]
#[diesel(table_name = generated_audios)]
struct NewAudio<'a> {
    input: &'a str,
    file_path: &'a str,
    file_mime_type: &'a str,
}

/// The local database behind every chat, message, memory, and
/// generated-media record. One bb8 pool over an embedded-migrated
/// SQLite file.
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub async fn open(path: &str) -> Result<Self> {
        ensure_parent_dir(path)?;
        run_migrations(path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))
    }

    async fn last_insert_rowid(conn: &mut SqliteAsyncConn) -> Result<i64> {
        let row: RowId = diesel::sql_query("SELECT last_insert_rowid() AS id")
            .get_result(conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(row.id)
    }

    // --- chats ---

    pub async fn create_chat(&self) -> Result<Chat> {
        let mut conn = self.conn().await?;
        diesel::insert_into(chats::table)
            .default_values()
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        let id = Self::last_insert_rowid(&mut conn).await?;
        Ok(Chat { id, title: None })
    }

    pub async fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>> {
        let mut conn = self.conn().await?;
        let row: Option<ChatRow> = chats::table
            .filter(chats::id.eq(chat_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(row.map(Chat::from))
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ChatRow> = chats::table
            .order(chats::id.desc())
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Chat::from).collect())
    }

    pub async fn set_chat_title(&self, chat_id: i64, title: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(chats::table.filter(chats::id.eq(chat_id)))
            .set(chats::title.eq(title))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    /// Deletes the chat and its messages. The schema has no enforced
    /// foreign key; the cascade is by convention.
    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(chat_messages::table.filter(chat_messages::chat_id.eq(chat_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        diesel::delete(chats::table.filter(chats::id.eq(chat_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    /// The chat plus its messages in ascending time order.
    pub async fn get_chat_with_messages(&self, chat_id: i64) -> Result<Option<ChatWithMessages>> {
        let Some(chat) = self.get_chat(chat_id).await? else {
            return Ok(None);
        };
        let messages = self.messages_in_chat(chat_id).await?;
        Ok(Some(ChatWithMessages { chat, messages }))
    }

    pub async fn messages_in_chat(&self, chat_id: i64) -> Result<Vec<ChatMessage>> {
        let mut conn = self.conn().await?;
        let rows: Vec<MessageRow> = chat_messages::table
            .filter(chat_messages::chat_id.eq(chat_id))
            .order((chat_messages::time.asc(), chat_messages::id.asc()))
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    // --- messages ---

    pub async fn insert_message(
        &self,
        chat_id: i64,
        role: &str,
        content: Option<&str>,
        generating: bool,
    ) -> Result<i64> {
        let new_message = NewMessage {
            chat_id,
            role,
            content,
            generating,
            time: now_millis(),
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(chat_messages::table)
            .values(&new_message)
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Self::last_insert_rowid(&mut conn).await
    }

    pub async fn update_message_content(&self, message_id: i64, content: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(chat_messages::table.filter(chat_messages::id.eq(message_id)))
            .set((
                chat_messages::content.eq(content),
                chat_messages::time.eq(now_millis()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn finalize_message(&self, message_id: i64, content: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(chat_messages::table.filter(chat_messages::id.eq(message_id)))
            .set((
                chat_messages::content.eq(content),
                chat_messages::generating.eq(false),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(chat_messages::table.filter(chat_messages::id.eq(message_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn count_generating_in_chat(&self, chat_id: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        chat_messages::table
            .filter(chat_messages::chat_id.eq(chat_id))
            .filter(chat_messages::generating.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))
    }

    pub async fn mark_all_not_generating_in_chat(&self, chat_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(chat_messages::table.filter(chat_messages::chat_id.eq(chat_id)))
            .set(chat_messages::generating.eq(false))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_empty_messages_in_chat(&self, chat_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(
            chat_messages::table
                .filter(chat_messages::chat_id.eq(chat_id))
                .filter(
                    chat_messages::content
                        .is_null()
                        .or(chat_messages::content.eq("")),
                ),
        )
        .execute(&mut conn)
        .await
        .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    // --- memories ---

    pub async fn all_memories(&self) -> Result<Vec<Memory>> {
        let mut conn = self.conn().await?;
        let rows: Vec<MemoryRow> = memories::table
            .order(memories::updated_time.desc())
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Memory::from).collect())
    }

    pub async fn latest_memories(&self, limit: i64) -> Result<Vec<Memory>> {
        let mut conn = self.conn().await?;
        let rows: Vec<MemoryRow> = memories::table
            .order(memories::updated_time.desc())
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Memory::from).collect())
    }

    /// Substring match over memory content, most recently updated first.
    pub async fn search_memories(&self, query: &str, limit: i64) -> Result<Vec<Memory>> {
        let mut conn = self.conn().await?;
        let pattern = format!("%{query}%");
        let rows: Vec<MemoryRow> = memories::table
            .filter(memories::content.like(pattern))
            .order(memories::updated_time.desc())
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Memory::from).collect())
    }

    pub async fn insert_memory(&self, content: &str, chat_id: Option<i64>) -> Result<i64> {
        let now = now_millis();
        let new_memory = NewMemory {
            content,
            chat_id,
            created_time: now,
            updated_time: now,
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(memories::table)
            .values(&new_memory)
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Self::last_insert_rowid(&mut conn).await
    }

    pub async fn update_memory_content(&self, memory_id: i64, content: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::update(memories::table.filter(memories::id.eq(memory_id)))
            .set((
                memories::content.eq(content),
                memories::updated_time.eq(now_millis()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_memory(&self, memory_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(memories::table.filter(memories::id.eq(memory_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_all_memories(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(memories::table)
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn count_memories(&self) -> Result<i64> {
        let mut conn = self.conn().await?;
        memories::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))
    }

    // --- generated media ---

    pub async fn insert_generated_image(
        &self,
        prompt: Option<&str>,
        url: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.conn().await?;
        diesel::insert_into(generated_images::table)
            .values(&NewImage { prompt, url })
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Self::last_insert_rowid(&mut conn).await
    }

    pub async fn list_generated_images(&self) -> Result<Vec<GeneratedImage>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ImageRow> = generated_images::table
            .order(generated_images::id.desc())
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| GeneratedImage {
                id: row.id,
                prompt: row.prompt,
                url: row.url,
            })
            .collect())
    }

    pub async fn delete_generated_image(&self, image_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(generated_images::table.filter(generated_images::id.eq(image_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_generated_audio(
        &self,
        input: &str,
        file_path: &str,
        file_mime_type: &str,
    ) -> Result<i64> {
        let mut conn = self.conn().await?;
        diesel::insert_into(generated_audios::table)
            .values(&NewAudio {
                input,
                file_path,
                file_mime_type,
            })
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Self::last_insert_rowid(&mut conn).await
    }

    pub async fn list_generated_audios(&self) -> Result<Vec<GeneratedAudio>> {
        let mut conn = self.conn().await?;
        let rows: Vec<AudioRow> = generated_audios::table
            .order(generated_audios::id.desc())
            .load(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| GeneratedAudio {
                id: row.id,
                input: row.input,
                file_path: row.file_path,
                file_mime_type: row.file_mime_type,
            })
            .collect())
    }

    pub async fn delete_generated_audio(&self, audio_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::delete(generated_audios::table.filter(generated_audios::id.eq(audio_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok(())
    }
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BlitzChatError::Database(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| BlitzChatError::Database(e.to_string()))?;
        Ok::<_, BlitzChatError>(())
    })
    .await
    .map_err(|e| BlitzChatError::Runtime(e.to_string()))??;
    Ok(())
}
