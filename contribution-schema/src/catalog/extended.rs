//! Schemas for providers outside the sample set.

use super::tags;
use crate::descriptor::{FieldKind, ListSpec, ObjectSchema, SchemaDescriptor, Uniqueness};

fn unique_objects(schema: ObjectSchema, key: &str) -> FieldKind {
    FieldKind::list(ListSpec {
        element: FieldKind::object(schema),
        uniqueness: Uniqueness::UniqueField(key.to_string()),
    })
}

fn titles() -> FieldKind {
    FieldKind::list(ListSpec {
        element: FieldKind::text(),
        uniqueness: Uniqueness::WarnOnDuplicates,
    })
}

pub fn linkedin() -> SchemaDescriptor {
    let connection = ObjectSchema::new()
        .required("name", FieldKind::text())
        .optional("headline", FieldKind::any_text())
        .required("url", FieldKind::Uri)
        .optional("pfp", FieldKind::Uri);

    SchemaDescriptor::new(
        tags::LINKEDIN,
        ObjectSchema::new()
            .required("linkedinUserData", FieldKind::Opaque)
            .required("connectionsList", FieldKind::list_of(FieldKind::object(connection))),
    )
}

pub fn spotify() -> SchemaDescriptor {
    let track = ObjectSchema::new()
        .required("trackId", FieldKind::text())
        .required("trackName", FieldKind::text());

    let playlist = ObjectSchema::new()
        .required("playlistId", FieldKind::text())
        .required("playlistName", FieldKind::text())
        .required("playlistOwner", FieldKind::text())
        .required("tracks", FieldKind::list_of(FieldKind::object(track.clone())));

    SchemaDescriptor::new(
        tags::SPOTIFY,
        ObjectSchema::new()
            .required("username", FieldKind::text())
            .required("userPlaylists", unique_objects(playlist, "playlistId"))
            .required("recentlyPlayed", FieldKind::list_of(FieldKind::object(track))),
    )
}

pub fn netflix() -> SchemaDescriptor {
    SchemaDescriptor::new(
        tags::NETFLIX,
        ObjectSchema::new()
            .required("profileName", FieldKind::text())
            .required("userId", FieldKind::text())
            .required("favorites", titles()),
    )
}

pub fn twitch() -> SchemaDescriptor {
    SchemaDescriptor::new(
        tags::TWITCH,
        ObjectSchema::new()
            .required("username", FieldKind::text())
            .required("followers", FieldKind::count())
            .required("pfpUrl", FieldKind::Uri)
            .required("bio", FieldKind::any_text())
            .optional("socials", FieldKind::list_of(FieldKind::text())),
    )
}

pub fn twitter() -> SchemaDescriptor {
    SchemaDescriptor::new(
        tags::TWITTER,
        ObjectSchema::new()
            .required("userName", FieldKind::text())
            .required("followers", FieldKind::count())
            .required("following", FieldKind::count())
            .required("posts", FieldKind::count())
            .required("userDescription", FieldKind::any_text()),
    )
}

pub fn reddit() -> SchemaDescriptor {
    let karma = ObjectSchema::new()
        .required("postKarma", FieldKind::Integer { min: None })
        .required("commentKarma", FieldKind::Integer { min: None });

    let post = ObjectSchema::new()
        .required("id", FieldKind::text())
        .required("title", FieldKind::text());

    SchemaDescriptor::new(
        tags::REDDIT,
        ObjectSchema::new()
            .required("username", FieldKind::text())
            .required("userid", FieldKind::text())
            .required("pfp", FieldKind::Uri)
            .required("bio", FieldKind::any_text())
            .required("socialLinks", FieldKind::list_of(FieldKind::text()))
            .required("karma", FieldKind::object(karma))
            .required("posts", unique_objects(post, "id")),
    )
}
