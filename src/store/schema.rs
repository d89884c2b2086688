diesel::table! {
    chats (id) {
        id -> BigInt,
        title -> Nullable<Text>,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> BigInt,
        chat_id -> BigInt,
        role -> Text,
        content -> Nullable<Text>,
        generating -> Bool,
        time -> BigInt,
    }
}

diesel::table! {
    generated_images (id) {
        id -> BigInt,
        prompt -> Nullable<Text>,
        url -> Nullable<Text>,
    }
}

diesel::table! {
    generated_audios (id) {
        id -> BigInt,
        input -> Text,
        file_path -> Text,
        file_mime_type -> Text,
    }
}

diesel::table! {
    memories (id) {
        id -> BigInt,
        content -> Text,
        chat_id -> Nullable<BigInt>,
        created_time -> BigInt,
        updated_time -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(chats, chat_messages);
