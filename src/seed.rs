//! Sample data for local development.
//!
//! Wipes every campground (reviews go with them) and inserts a fresh batch
//! owned by a demo account. Titles, places and prices are spread
//! deterministically over the tables below, so two runs produce the same set.
//! Objects in storage that belonged to removed campgrounds are left in place.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::AppError,
    models::{Campground, CampgroundImage, Geometry, User},
    repository::RepositoryState,
};

pub const DEMO_USERNAME: &str = "tim";
pub const DEMO_EMAIL: &str = "tim@yelpcamp.local";
pub const DEMO_PASSWORD: &str = "campfire";

const SAMPLE_IMAGE_URL: &str = "https://source.unsplash.com/collection/483251";

const DESCRIPTION: &str = "Lorem ipsum dolor sit amet consectetur, adipisicing elit. \
     Eius quis veniam a distinctio laborum. Sit modi numquam itaque aspernatur, odio ducimus.";

const DESCRIPTORS: &[&str] = &[
    "Forest", "Ancient", "Petrified", "Roaring", "Cascade", "Tumbling", "Silent", "Redwood",
    "Bullfrog", "Maple", "Misty", "Elk", "Grizzly", "Ocean", "Sea", "Sky", "Dusty", "Diamond",
];

const PLACES: &[&str] = &[
    "Flats", "Village", "Canyon", "Pond", "Group Camp", "Horse Camp", "Ghost Town", "Camp",
    "Dispersed Camp", "Backcountry", "River", "Creek", "Creekside", "Bay", "Spring", "Bayshore",
];

/// (city, state, longitude, latitude)
const CITIES: &[(&str, &str, f64, f64)] = &[
    ("Lynchburg", "Virginia", -79.1422, 37.4138),
    ("Asheville", "North Carolina", -82.5515, 35.5951),
    ("Boulder", "Colorado", -105.2705, 40.015),
    ("Bend", "Oregon", -121.3153, 44.0582),
    ("Moab", "Utah", -109.5498, 38.5733),
    ("Flagstaff", "Arizona", -111.6513, 35.1983),
    ("Missoula", "Montana", -113.994, 46.8721),
    ("Burlington", "Vermont", -73.2121, 44.4759),
    ("Duluth", "Minnesota", -92.1005, 46.7867),
    ("Chattanooga", "Tennessee", -85.3097, 35.0456),
    ("Bozeman", "Montana", -111.0429, 45.677),
    ("Tahoe City", "California", -120.1446, 39.1677),
];

/// What a seeding run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub removed: usize,
    pub inserted: usize,
    pub author: Uuid,
}

/// seed_campgrounds
///
/// Replaces every campground with `count` sample ones owned by the demo
/// account, which is created on first use.
pub async fn seed_campgrounds(
    repo: &RepositoryState,
    count: usize,
) -> Result<SeedReport, AppError> {
    let author = demo_user(repo).await?;

    let existing = repo.list_campgrounds().await?;
    let mut removed = 0;
    for campground in existing {
        if repo.delete_campground(campground.id).await?.is_some() {
            removed += 1;
        }
    }

    for index in 0..count {
        repo.insert_campground(sample_campground(index, author.id)).await?;
    }

    tracing::info!(removed, inserted = count, author = %author.id, "campgrounds seeded");
    Ok(SeedReport {
        removed,
        inserted: count,
        author: author.id,
    })
}

async fn demo_user(repo: &RepositoryState) -> Result<User, AppError> {
    if let Some(user) = repo.find_user_by_username(DEMO_USERNAME).await? {
        return Ok(user);
    }

    let user = User {
        id: Uuid::new_v4(),
        username: DEMO_USERNAME.to_string(),
        email: DEMO_EMAIL.to_string(),
        password_hash: hash_password(DEMO_PASSWORD.to_string()).await?,
    };
    Ok(repo.create_user(user).await?)
}

fn sample_campground(index: usize, author: Uuid) -> Campground {
    let (city, state, longitude, latitude) = CITIES[(index * 7) % CITIES.len()];
    let title = format!(
        "{} {}",
        DESCRIPTORS[index % DESCRIPTORS.len()],
        PLACES[(index * 5) % PLACES.len()]
    );

    Campground {
        id: Uuid::new_v4(),
        title,
        price: (10 + (index * 13) % 20) as f64,
        description: DESCRIPTION.to_string(),
        location: format!("{}, {}", city, state),
        geometry: Some(Geometry::point(longitude, latitude)),
        // Hotlinked, not in object storage; the key is never uploaded.
        images: vec![CampgroundImage {
            url: SAMPLE_IMAGE_URL.to_string(),
            filename: format!("seed/{}", index),
        }],
        author,
        reviews: Vec::new(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::verify_password, repository::MemoryRepository};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seeding_replaces_campgrounds_and_reuses_the_demo_user() {
        let memory = MemoryRepository::new();
        let repo: RepositoryState = Arc::new(memory.clone());

        let first = seed_campgrounds(&repo, 5).await.unwrap();
        assert_eq!(first.removed, 0);
        assert_eq!(memory.campground_count().await, 5);

        let second = seed_campgrounds(&repo, 3).await.unwrap();
        assert_eq!(second.removed, 5);
        assert_eq!(second.author, first.author);
        assert_eq!(memory.campground_count().await, 3);

        let demo = repo
            .find_user_by_username(DEMO_USERNAME)
            .await
            .unwrap()
            .unwrap();
        assert!(
            verify_password(DEMO_PASSWORD.to_string(), demo.password_hash)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_sample_campgrounds_are_valid_listings() {
        let author = Uuid::new_v4();
        for index in 0..50 {
            let campground = sample_campground(index, author);
            assert!((10.0..30.0).contains(&campground.price));
            assert!(campground.geometry.is_some());
            assert_eq!(campground.author, author);
            assert!(!campground.title.is_empty());
        }
    }
}
