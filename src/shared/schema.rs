diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        role -> Varchar,
        department -> Nullable<Varchar>,
        phone_extension -> Nullable<Varchar>,
        supervisor_id -> Nullable<Uuid>,
        is_superuser -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    customers (id) {
        id -> Uuid,
        full_name -> Varchar,
        email -> Varchar,
        phone_number -> Varchar,
        address -> Nullable<Text>,
        account_status -> Varchar,
        assigned_agent_id -> Nullable<Uuid>,
        registration_date -> Timestamptz,
    }
}

diesel::table! {
    calls (id) {
        id -> Uuid,
        customer_id -> Uuid,
        agent_id -> Nullable<Uuid>,
        call_start_time -> Timestamptz,
        call_end_time -> Nullable<Timestamptz>,
        call_type -> Varchar,
        recording_path -> Nullable<Text>,
        notes -> Nullable<Text>,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Text,
        issue_category -> Varchar,
        priority_level -> Varchar,
        status -> Varchar,
        customer_id -> Uuid,
        agent_id -> Nullable<Uuid>,
        call_id -> Nullable<Uuid>,
        created_by_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    campaigns (id) {
        id -> Uuid,
        campaign_name -> Varchar,
        campaign_type -> Varchar,
        start_date -> Date,
        end_date -> Date,
        status -> Varchar,
        target_group -> Varchar,
    }
}

diesel::table! {
    campaign_members (campaign_id, customer_id) {
        campaign_id -> Uuid,
        customer_id -> Uuid,
    }
}

diesel::table! {
    security_logs (id) {
        id -> Uuid,
        user_id -> Nullable<Uuid>,
        event_type -> Varchar,
        ip_address -> Nullable<Varchar>,
        timestamp -> Timestamptz,
        description -> Nullable<Text>,
    }
}

diesel::joinable!(customers -> users (assigned_agent_id));
diesel::joinable!(calls -> customers (customer_id));
diesel::joinable!(calls -> users (agent_id));
diesel::joinable!(tickets -> customers (customer_id));
diesel::joinable!(tickets -> users (agent_id));
diesel::joinable!(tickets -> calls (call_id));
diesel::joinable!(campaign_members -> campaigns (campaign_id));
diesel::joinable!(campaign_members -> customers (customer_id));
diesel::joinable!(security_logs -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    customers,
    calls,
    tickets,
    campaigns,
    campaign_members,
    security_logs,
);
