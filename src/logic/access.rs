//! Who gets to see and change what.
//!
//! An [`Actor`] is an authenticated caller. The methods on it answer one question each, and each
//! matches on the caller's role exhaustively, so adding a role means deciding what it may do
//! everywhere.
//!
//! | Role                                | Classes visible             | Absences visible for       |
//! |-------------------------------------|-----------------------------|----------------------------|
//! | admin, principal, principal assist. | all                         | anybody                    |
//! | teacher                             | the ones they teach         | students of those classes  |
//! | parent                              | the ones their children are | their children, if enabled |
//! | student                             | the ones they're in         | themselves                 |
//! | school psychologist                 | the ones they're in         | anybody                    |
//! | unverified                          | none                        | nobody                     |

use crate::{
    logic::ApiError,
    schema::{Absence, Class, Grade, Meeting, Role, Subject, User},
};
use std::collections::BTreeSet;

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    /// The caller's user ID.
    pub id: i32,

    /// The caller's role, as it was when their token was issued.
    pub role: Role,

    /// For parents, the IDs of their children. Empty for everybody else.
    pub children: BTreeSet<i32>,
}

impl Actor {
    /// Whether the actor belongs to the school's administration.
    pub fn is_admin_tier(&self) -> bool {
        self.role.is_admin_tier()
    }

    /// Fails unless the actor belongs to the school's administration.
    pub fn require_admin_tier(&self) -> Result<(), ApiError> {
        if self.is_admin_tier() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// The error to report when something the actor asked for doesn't exist. Only admin-tier
    /// actors learn that it doesn't exist, so nobody else can probe for IDs.
    pub fn missing(&self) -> ApiError {
        if self.is_admin_tier() {
            ApiError::NotFound
        } else {
            ApiError::Forbidden
        }
    }

    /// Whether the actor may see a class with the given students.
    pub fn can_see_class(&self, class: &Class, students: &BTreeSet<i32>) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => class.teacher == self.id,
            Role::Parent => !self.children.is_disjoint(students),
            Role::Student | Role::SchoolPsychologist => students.contains(&self.id),
            Role::Unverified => false,
        }
    }

    /// Filters a list of classes (with their students) down to the ones the actor may see.
    pub fn visible_classes<I>(&self, classes: I) -> Vec<Class>
    where
        I: IntoIterator<Item = (Class, BTreeSet<i32>)>,
    {
        classes
            .into_iter()
            .filter(|(class, students)| self.can_see_class(class, students))
            .map(|(class, _)| class)
            .collect()
    }

    /// Whether the actor may see the details of a class (its students and their data).
    pub fn can_inspect_class(&self, class: &Class) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => class.teacher == self.id,
            Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => false,
        }
    }

    /// Whether the actor may add students to and remove students from classes and subjects, and
    /// link children to parents.
    pub fn can_manage_memberships(&self) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher
            | Role::Parent
            | Role::Student
            | Role::SchoolPsychologist
            | Role::Unverified => false,
        }
    }

    /// Whether the actor may see a subject with the given (already resolved) students.
    pub fn can_see_subject(&self, subject: &Subject, students: &BTreeSet<i32>) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => subject.teacher_id == self.id,
            Role::Parent => !self.children.is_disjoint(students),
            Role::Student | Role::SchoolPsychologist => students.contains(&self.id),
            Role::Unverified => false,
        }
    }

    /// Whether the actor may run a subject's lessons: create and change meetings, record
    /// absences, give grades and homework. That's the subject's teacher, or the administration.
    pub fn can_teach(&self, subject: &Subject) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => subject.teacher_id == self.id,
            Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => false,
        }
    }

    /// Whether the actor may run a single meeting: record absences and give homework. A
    /// substitute teacher holds the meetings they were assigned, even in someone else's subject.
    pub fn can_hold(&self, meeting: &Meeting, subject: &Subject) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => meeting.teacher_id == self.id || subject.teacher_id == self.id,
            Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => false,
        }
    }

    /// Whether the actor may change or delete a grade. Teachers may change the grades they gave
    /// and the grades in their own subjects.
    pub fn can_change_grade(&self, grade: &Grade, subject: &Subject) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => grade.teacher_id == self.id || subject.teacher_id == self.id,
            Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => false,
        }
    }

    /// Whether the actor may see and record a class's self-testing results.
    pub fn can_test_class(&self, class: &Class) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::SchoolPsychologist => true,
            Role::Teacher => class.teacher == self.id,
            Role::Parent | Role::Student | Role::Unverified => false,
        }
    }

    /// Whether the actor may see a student's self-testing certificate. Any staff member may, so
    /// the certificate can be checked at the door.
    pub fn can_see_testing_of(&self, student: i32) -> bool {
        match self.role {
            Role::Admin
            | Role::Principal
            | Role::PrincipalAssistant
            | Role::SchoolPsychologist
            | Role::Teacher => true,
            Role::Parent => self.children.contains(&student),
            Role::Student => student == self.id,
            Role::Unverified => false,
        }
    }

    /// The students whose own entries (homework statuses, for example) the actor sees as a member
    /// of a subject rather than as its teacher.
    pub fn own_students(&self) -> BTreeSet<i32> {
        match self.role {
            Role::Student => std::iter::once(self.id).collect(),
            Role::Parent => self.children.clone(),
            Role::Admin
            | Role::Principal
            | Role::PrincipalAssistant
            | Role::Teacher
            | Role::SchoolPsychologist
            | Role::Unverified => BTreeSet::new(),
        }
    }

    /// Whether the actor may see a meeting of the given subject (with its resolved students).
    /// Teachers see the meetings they hold, including substitutions, as well as the meetings of
    /// their own subjects.
    pub fn can_see_meeting(
        &self,
        meeting: &Meeting,
        subject: &Subject,
        students: &BTreeSet<i32>,
    ) -> bool {
        match self.role {
            Role::Admin | Role::Principal | Role::PrincipalAssistant => true,
            Role::Teacher => meeting.teacher_id == self.id || subject.teacher_id == self.id,
            Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => {
                self.can_see_subject(subject, students)
            }
        }
    }

    /// Whether the actor may see a student's records (absences or grades). `classes` must hold
    /// every class with its students; a teacher may only see students enrolled in one of the
    /// classes they teach. `parents_allowed` is the configuration flag that lets parents see
    /// this kind of record.
    pub fn can_see_records_of(
        &self,
        student: i32,
        classes: &[(Class, BTreeSet<i32>)],
        parents_allowed: bool,
    ) -> bool {
        match self.role {
            Role::Admin
            | Role::Principal
            | Role::PrincipalAssistant
            | Role::SchoolPsychologist => true,
            Role::Teacher => classes
                .iter()
                .any(|(class, students)| class.teacher == self.id && students.contains(&student)),
            Role::Parent => parents_allowed && self.children.contains(&student),
            Role::Student => student == self.id,
            Role::Unverified => false,
        }
    }

    /// Whether `can_see_records_of` and `can_see_user` need the list of classes for this actor.
    pub fn needs_classes_for_records(&self) -> bool {
        self.role == Role::Teacher
    }

    /// Whether the actor may see another user's profile.
    pub fn can_see_user(&self, user: &User, classes: &[(Class, BTreeSet<i32>)]) -> bool {
        if user.id == self.id {
            return self.role != Role::Unverified;
        }
        match self.role {
            Role::Admin
            | Role::Principal
            | Role::PrincipalAssistant
            | Role::SchoolPsychologist => true,
            Role::Teacher => {
                user.role == Role::Teacher
                    || classes.iter().any(|(class, students)| {
                        class.teacher == self.id && students.contains(&user.id)
                    })
            }
            Role::Parent => self.children.contains(&user.id),
            Role::Student | Role::Unverified => false,
        }
    }

    /// Whether the actor may see birth certificate numbers.
    pub fn can_see_birth_certificates(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the actor may issue certificates of schooling.
    pub fn can_issue_certificates(&self) -> bool {
        match self.role {
            Role::Admin
            | Role::Principal
            | Role::PrincipalAssistant
            | Role::SchoolPsychologist => true,
            Role::Teacher | Role::Parent | Role::Student | Role::Unverified => false,
        }
    }

    /// Whether the actor may change another user's role to `role`. Only admins may appoint
    /// admins.
    pub fn can_grant(&self, role: Role) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Principal | Role::PrincipalAssistant => role != Role::Admin,
            Role::Teacher
            | Role::Parent
            | Role::Student
            | Role::SchoolPsychologist
            | Role::Unverified => false,
        }
    }
}

/// Keeps only the absences that are actual absences; the rest are annotations that the student
/// and their parents don't need to see.
pub fn reportable_absences(absences: Vec<Absence>) -> Vec<Absence> {
    absences
        .into_iter()
        .filter(|absence| absence.absence_type.is_absence())
        .collect()
}
