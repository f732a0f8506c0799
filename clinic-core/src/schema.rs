use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    clinic_users (id) {
        id -> BigInt,
        name -> Text,
        email -> Text,
        password_hash -> Nullable<Text>,
        is_admin -> Bool,
        is_doctor -> Bool,
        is_blocked -> Bool,
        is_verified -> Bool,
        external_id -> Nullable<Text>,
        picture -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    clinic_doctors (id) {
        id -> BigInt,
        user_id -> BigInt,
        first_name -> Nullable<Text>,
        last_name -> Text,
        phone -> Text,
        email -> Text,
        website -> Nullable<Text>,
        address -> Text,
        specialization -> Text,
        experience_years -> Integer,
        fee_per_consultation -> BigInt,
        work_start -> Time,
        work_end -> Time,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    clinic_appointments (id) {
        id -> BigInt,
        doctor_id -> BigInt,
        user_id -> BigInt,
        slot_date -> Date,
        slot_time -> Time,
        reason -> Text,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    clinic_notifications (id) {
        id -> BigInt,
        user_id -> BigInt,
        kind -> Text,
        message -> Text,
        data -> Jsonb,
        on_click_path -> Nullable<Text>,
        seen_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

joinable!(clinic_doctors -> clinic_users (user_id));
joinable!(clinic_appointments -> clinic_users (user_id));
joinable!(clinic_notifications -> clinic_users (user_id));

allow_tables_to_appear_in_same_query!(
    clinic_users,
    clinic_doctors,
    clinic_appointments,
    clinic_notifications,
);
