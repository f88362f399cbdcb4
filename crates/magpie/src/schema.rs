// Diesel table definitions for the archive store.
//
// Timestamps are RFC 3339 TEXT; header lists and metadata are JSON TEXT.

diesel::table! {
    urls (id) {
        id -> Text,
        url -> Text,
        host -> Text,
        created -> Text,
        updated -> Text,
        last_head -> Nullable<Text>,
        last_get -> Nullable<Text>,
        status -> Integer,
        content_type -> Text,
        content_sniff -> Text,
        content_length -> BigInt,
        file_name -> Text,
        title -> Text,
        headers -> Text,
        hash -> Text,
    }
}

diesel::table! {
    links (src, dst) {
        src -> Text,
        dst -> Text,
        created -> Text,
        updated -> Text,
    }
}

diesel::table! {
    snapshots (id) {
        id -> Integer,
        url -> Text,
        created -> Text,
        status -> Integer,
        duration_ms -> BigInt,
        headers -> Text,
        hash -> Text,
    }
}

diesel::table! {
    sources (id) {
        id -> Text,
        url -> Text,
        name -> Text,
        crawl -> Integer,
        stale_hours -> Nullable<BigInt>,
        metadata -> Text,
        created -> Text,
        updated -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(urls, links, snapshots, sources);
