//! Diesel schema for task persistence.

diesel::table! {
    /// Task records with stage outputs and gate decisions.
    tasks (id) {
        /// Store-assigned task identifier.
        id -> BigInt,
        /// Free-text request.
        request -> Text,
        /// Coarse status derived from the workflow state.
        status -> Text,
        /// Workflow state.
        workflow_state -> Text,
        /// Creation timestamp (RFC 3339).
        created_at -> Text,
        /// Last update timestamp (RFC 3339).
        updated_at -> Text,
        /// Plan text.
        plan -> Nullable<Text>,
        /// Serialized implementation report.
        implementation_result -> Nullable<Text>,
        /// Serialized review.
        review -> Nullable<Text>,
        /// Serialized verification report.
        verification_result -> Nullable<Text>,
        /// Plan approval timestamp.
        plan_approved_at -> Nullable<Text>,
        /// Plan approver.
        plan_approved_by -> Nullable<Text>,
        /// Plan rejection reason.
        plan_rejection_reason -> Nullable<Text>,
        /// Implementation approval timestamp.
        implementation_approved_at -> Nullable<Text>,
        /// Implementation approver.
        implementation_approved_by -> Nullable<Text>,
        /// Implementation rejection reason.
        implementation_rejection_reason -> Nullable<Text>,
        /// Failure description.
        error_details -> Nullable<Text>,
        /// Explicit implementation retries.
        retry_count -> Integer,
    }
}

diesel::table! {
    /// Append-only stage snapshots.
    checkpoints (id) {
        /// Insertion id.
        id -> BigInt,
        /// Owning task.
        task_id -> BigInt,
        /// Checkpoint name.
        name -> Text,
        /// Serialized checkpoint payload.
        data -> Text,
        /// Creation timestamp (RFC 3339).
        created_at -> Text,
    }
}

diesel::joinable!(checkpoints -> tasks (task_id));
diesel::allow_tables_to_appear_in_same_query!(tasks, checkpoints);
